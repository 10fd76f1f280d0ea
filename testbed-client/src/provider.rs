//! Starts the system under test and pairs it with a [`RestClient`].

use crate::client::{RestClient, RestClientConfig};
use std::future::Future;
use testbed_core::context::{ClientAndServer, SystemUnderTestProvider};
use testbed_core::env::EnvVars;
use testbed_core::error::{Result, TestbedError};
use testbed_core::future::TestbedFuture;
use testbed_core::mock::{HttpConfig, HttpListener};

/// Port the system under test listens on unless configured otherwise.
pub const DEFAULT_SUT_PORT: u16 = 9999;

/// Starts an HTTP server for the system under test.
///
/// Implemented for closures taking the listen address and the merged env by
/// value and resolving to any [`HttpListener`].
pub trait ServerStarter: Send + Sync {
    /// Start listening on `http`.
    fn start<'a>(
        &'a self,
        http: &'a HttpConfig,
        env: &'a EnvVars,
    ) -> TestbedFuture<'a, Box<dyn HttpListener>>;
}

impl<F, Fut, L> ServerStarter for F
where
    F: Fn(HttpConfig, EnvVars) -> Fut + Send + Sync,
    Fut: Future<Output = Result<L>> + Send + 'static,
    L: HttpListener + 'static,
{
    fn start<'a>(
        &'a self,
        http: &'a HttpConfig,
        env: &'a EnvVars,
    ) -> TestbedFuture<'a, Box<dyn HttpListener>> {
        let started = (self)(http.clone(), env.clone());
        Box::pin(async move {
            let listener: Box<dyn HttpListener> = Box::new(started.await?);
            Ok(listener)
        })
    }
}

/// Provides a [`RestClient`] for a server started by a [`ServerStarter`].
pub struct RestClientAndServerProvider<S> {
    starter: S,
    http: HttpConfig,
    client_config: RestClientConfig,
}

impl<S: ServerStarter> RestClientAndServerProvider<S> {
    /// Start `starter` on `localhost:9999`.
    pub fn new(starter: S) -> Self {
        Self {
            starter,
            http: HttpConfig::localhost(DEFAULT_SUT_PORT),
            client_config: RestClientConfig::default(),
        }
    }

    /// Listen on `http` instead. Port 0 picks a free port.
    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Configure the client.
    #[must_use]
    pub fn with_client_config(mut self, client_config: RestClientConfig) -> Self {
        self.client_config = client_config;
        self
    }

    /// Address the server is started on.
    pub fn http(&self) -> &HttpConfig {
        &self.http
    }
}

impl<S: ServerStarter> SystemUnderTestProvider<RestClient> for RestClientAndServerProvider<S> {
    fn provide<'a>(&'a self, env: &'a EnvVars) -> TestbedFuture<'a, ClientAndServer<RestClient>> {
        Box::pin(async move {
            let listener = self.starter.start(&self.http, env).await?;

            let client = match RestClient::with_config(listener.on_url(), &self.client_config) {
                Ok(client) => client,
                Err(e) => {
                    if let Err(close_err) = listener.close().await {
                        tracing::warn!(error = %close_err, "Failed to close system under test");
                    }
                    return Err(TestbedError::SystemUnderTest {
                        cause: e.to_string(),
                    });
                }
            };

            tracing::info!(url = %client.base_url(), "System under test started");
            Ok(ClientAndServer::new(client, listener))
        })
    }
}

impl<S> std::fmt::Debug for RestClientAndServerProvider<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClientAndServerProvider")
            .field("http", &self.http)
            .field("client_config", &self.client_config)
            .finish_non_exhaustive()
    }
}
