//! Mock HTTP server state and request resolution.
//!
//! A [`MockHttpServer`] owns a FIFO queue of expectations, a set of stubs and
//! a failure log. Transports reach it through a cloned [`MockConfig`] handle
//! and call [`MockConfig::respond`] once per inbound request.
//!
//! Resolution of one request:
//!
//! 1. A queued expectation is dequeued whether or not it matches.
//! 2. Otherwise the stubs are filtered. More than one match is a hard error.
//! 3. With nothing applicable a "No remaining expectations" failure is
//!    recorded and the transport answers 404.
//! 4. The applicable expectation is checked. A mismatch is recorded and
//!    answered with 400; a pass is answered with the configured response.

use super::expectation::Expectation;
use super::failure::{Failure, VerifyError};
use super::listener::{HttpConfig, HttpListener, HttpMockConfig, MockListenerFactory};
use super::port::PortAllocator;
use super::request::RequestInfo;
use crate::env::EnvVars;
use crate::error::{Result, TestbedError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

/// Configuration of one mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerConfig {
    /// Name, unique within a test context.
    pub name: String,
    /// Env key the server's base url is published under.
    pub url_env_key: String,
    /// Protocol and host.
    pub http: HttpMockConfig,
}

impl MockServerConfig {
    /// Plain HTTP on localhost.
    pub fn new(name: impl Into<String>, url_env_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_env_key: url_env_key.into(),
            http: HttpMockConfig::default(),
        }
    }

    /// Use a different protocol and host.
    pub fn with_http(mut self, http: HttpMockConfig) -> Self {
        self.http = http;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TestbedError::ConfigValue {
                field: "name".to_string(),
                cause: "mock server name must not be empty".to_string(),
            });
        }
        if self.url_env_key.trim().is_empty() {
            return Err(TestbedError::ConfigValue {
                field: "url_env_key".to_string(),
                cause: format!("mock server {} has an empty env key", self.name),
            });
        }
        if self.http.host.trim().is_empty() {
            return Err(TestbedError::ConfigValue {
                field: "http.host".to_string(),
                cause: format!("mock server {} has an empty host", self.name),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    stubs: Vec<Expectation>,
    failures: Vec<Failure>,
}

struct Shared {
    name: String,
    state: Mutex<MockState>,
}

/// Handle a transport uses to answer requests for one mock server.
#[derive(Clone)]
pub struct MockConfig {
    shared: Arc<Shared>,
}

impl MockConfig {
    /// Name of the mock server.
    pub fn mock_server_name(&self) -> &str {
        &self.shared.name
    }

    /// Pick the expectation that applies to `request`.
    ///
    /// Dequeues the head of the queue if there is one. Otherwise returns the
    /// single stub that matches, or `None`.
    pub fn applicable_expectation(&self, request: &RequestInfo) -> Result<Option<Expectation>> {
        let mut state = self.shared.state.lock();

        if let Some(expectation) = state.expectations.pop_front() {
            return Ok(Some(expectation));
        }

        let mut matching = state.stubs.iter().filter(|stub| stub.check(request).passed());
        let first = matching.next().cloned();
        if matching.next().is_some() {
            return Err(TestbedError::MultipleStubsMatch {
                server: self.shared.name.clone(),
                method: request.method.clone(),
                url: request.url.clone(),
            });
        }
        Ok(first)
    }

    /// Record a failure for the next verify.
    pub fn register_failure(&self, failure: Failure) {
        tracing::debug!(
            server = %self.shared.name,
            reason = %failure.reason,
            "Recording mock failure"
        );
        self.shared.state.lock().failures.push(failure);
    }

    /// Resolve a request into the response to send.
    ///
    /// Only a multiple-stub match is returned as an error. Missing and
    /// mismatching expectations are recorded and answered with 404 / 400.
    pub fn respond(&self, request: &RequestInfo) -> Result<MockResponse> {
        let Some(expectation) = self.applicable_expectation(request)? else {
            tracing::warn!(
                server = %self.shared.name,
                method = %request.method,
                url = %request.url,
                "No remaining expectations or applicable stubs"
            );
            self.register_failure(Failure::no_remaining_expectations(request.clone()));
            return Ok(MockResponse::failure(404, NO_EXPECTATION_TEXT));
        };

        let result = expectation.check(request);
        if !result.passed() {
            tracing::warn!(
                server = %self.shared.name,
                method = %request.method,
                url = %request.url,
                mismatches = result.mismatches().len(),
                "Expectation did not match"
            );
            self.register_failure(Failure::did_not_match(result.diff()));
            return Ok(MockResponse::failure(400, DID_NOT_MATCH_TEXT));
        }

        let response = &expectation.response;
        tracing::debug!(
            server = %self.shared.name,
            status = response.status,
            url = %request.url,
            "Expectation matched"
        );
        Ok(MockResponse::matched(
            response.status,
            response.status_text.clone(),
            response.body.render(request),
        ))
    }
}

impl std::fmt::Debug for MockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConfig")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

/// What a transport sends back for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase, when configured.
    pub status_text: Option<String>,
    /// JSON body.
    pub body: Option<Value>,
    /// Send `content-type: application/json`, with or without a body.
    pub json: bool,
}

impl MockResponse {
    /// A response built from a matched expectation.
    pub fn matched(status: u16, status_text: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            status,
            status_text: Some(status_text.into()),
            body,
            json: true,
        }
    }

    /// A bodiless response for a recorded failure.
    pub fn failure(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: Some(status_text.into()),
            body: None,
            json: false,
        }
    }
}

const NO_EXPECTATION_TEXT: &str = "No remaining expectations or applicable stubs found";
const DID_NOT_MATCH_TEXT: &str = "Expectation did not match";

enum ListenerSlot {
    Idle,
    Starting,
    Running(Box<dyn HttpListener>),
}

/// A mock HTTP server.
pub struct MockHttpServer {
    config: MockServerConfig,
    http: HttpConfig,
    shared: Arc<Shared>,
    factory: Arc<dyn MockListenerFactory>,
    listener: Mutex<ListenerSlot>,
}

impl MockHttpServer {
    /// Create a server on the next port from `ports`.
    pub fn new(
        config: MockServerConfig,
        factory: Arc<dyn MockListenerFactory>,
        ports: &PortAllocator,
    ) -> Result<Self> {
        config.validate()?;
        let http = config.http.with_port(ports.allocate()?);
        let shared = Arc::new(Shared {
            name: config.name.clone(),
            state: Mutex::new(MockState::default()),
        });

        Ok(Self {
            config,
            http,
            shared,
            factory,
            listener: Mutex::new(ListenerSlot::Idle),
        })
    }

    /// Name of the server.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Env key the base url is published under.
    pub fn url_env_key(&self) -> &str {
        &self.config.url_env_key
    }

    /// Allocated port.
    pub fn port(&self) -> u16 {
        self.http.port
    }

    /// Base url.
    pub fn url(&self) -> String {
        self.http.url()
    }

    /// The single env entry this server publishes.
    pub fn env_entries(&self) -> EnvVars {
        EnvVars::from([(self.config.url_env_key.clone(), self.url())])
    }

    /// Handle for driving the server without a transport.
    pub fn mock_config(&self) -> MockConfig {
        MockConfig {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Queue an expectation. Consumed by the next request.
    pub fn expect(&self, expectation: Expectation) -> &Self {
        self.shared.state.lock().expectations.push_back(expectation);
        self
    }

    /// Add a stub. Never consumed.
    pub fn stub(&self, stub: Expectation) -> &Self {
        self.shared.state.lock().stubs.push(stub);
        self
    }

    /// Expectations still queued.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().expectations.len()
    }

    /// Failures recorded since the last verify.
    pub fn failures(&self) -> Vec<Failure> {
        self.shared.state.lock().failures.clone()
    }

    /// Whether a listener is running.
    pub fn is_listening(&self) -> bool {
        matches!(*self.listener.lock(), ListenerSlot::Running(_))
    }

    /// Start the transport.
    pub async fn listen(&self) -> Result<()> {
        {
            let mut slot = self.listener.lock();
            if !matches!(*slot, ListenerSlot::Idle) {
                return Err(TestbedError::ListenerAlreadyStarted {
                    server: self.config.name.clone(),
                });
            }
            *slot = ListenerSlot::Starting;
        }

        match self.factory.listen(self.mock_config(), self.http.clone()).await {
            Ok(listener) => {
                tracing::info!(
                    server = %self.config.name,
                    url = %listener.on_url(),
                    "Mock server listening"
                );
                *self.listener.lock() = ListenerSlot::Running(listener);
                Ok(())
            }
            Err(e) => {
                *self.listener.lock() = ListenerSlot::Idle;
                Err(e)
            }
        }
    }

    /// Stop the transport. The server may listen again afterwards.
    pub async fn close(&self) -> Result<()> {
        let listener = {
            let mut slot = self.listener.lock();
            match std::mem::replace(&mut *slot, ListenerSlot::Idle) {
                ListenerSlot::Running(listener) => listener,
                other => {
                    *slot = other;
                    return Err(TestbedError::ListenerNotStarted {
                        server: self.config.name.clone(),
                    });
                }
            }
        };

        listener.close().await?;
        tracing::info!(server = %self.config.name, "Mock server closed");
        Ok(())
    }

    /// Check that every expectation was consumed and nothing failed.
    ///
    /// Resets the queue and the failure log whatever the outcome. Stubs are
    /// kept.
    pub fn verify(&self) -> std::result::Result<(), VerifyError> {
        let (unmet, failed) = {
            let mut state = self.shared.state.lock();
            let unmet: Vec<Expectation> = state.expectations.drain(..).collect();
            let failed = std::mem::take(&mut state.failures);
            (unmet, failed)
        };

        if unmet.is_empty() && failed.is_empty() {
            tracing::debug!(server = %self.config.name, "Mock server verified");
            return Ok(());
        }

        let report = VerifyError::new(self.config.name.clone(), unmet, failed);
        tracing::warn!(
            server = %self.config.name,
            unmet = report.unmet.len(),
            failed = report.failed.len(),
            "Mock server verification failed"
        );
        Err(report)
    }
}

impl std::fmt::Debug for MockHttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHttpServer")
            .field("config", &self.config)
            .field("http", &self.http)
            .finish_non_exhaustive()
    }
}
