//! Listener seams between the mock engine and a network transport.

use super::server::MockConfig;
use crate::future::TestbedFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

/// Address a listener binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Protocol.
    pub protocol: Protocol,
    /// Host name or address.
    pub host: String,
    /// Port.
    pub port: u16,
}

impl HttpConfig {
    /// Plain HTTP on `localhost:port`.
    pub fn localhost(port: u16) -> Self {
        Self {
            protocol: Protocol::Http,
            host: "localhost".to_string(),
            port,
        }
    }

    /// Base url, e.g. `http://localhost:9000`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// `host:port`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::localhost(8080)
    }
}

/// Address of a mock server minus its port, which is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMockConfig {
    /// Protocol.
    pub protocol: Protocol,
    /// Host name or address.
    pub host: String,
}

impl HttpMockConfig {
    /// Complete with an allocated port.
    pub fn with_port(&self, port: u16) -> HttpConfig {
        HttpConfig {
            protocol: self.protocol,
            host: self.host.clone(),
            port,
        }
    }
}

impl Default for HttpMockConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Http,
            host: "localhost".to_string(),
        }
    }
}

/// Something that must be shut down at the end of a suite.
pub trait Closeable: Send + Sync {
    /// Shut down and release resources.
    fn close(self: Box<Self>) -> TestbedFuture<'static, ()>;
}

/// A running listener.
pub trait HttpListener: Closeable {
    /// Base url the listener accepts requests on.
    fn on_url(&self) -> &str;
}

impl Closeable for Box<dyn HttpListener> {
    fn close(self: Box<Self>) -> TestbedFuture<'static, ()> {
        (*self).close()
    }
}

/// Starts transports that feed requests into a mock server.
pub trait MockListenerFactory: Send + Sync {
    /// Start listening on `http` and answer requests through `mock`.
    fn listen(&self, mock: MockConfig, http: HttpConfig) -> TestbedFuture<'_, Box<dyn HttpListener>>;
}
