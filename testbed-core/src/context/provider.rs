//! System-under-test provider seam.

use crate::env::EnvVars;
use crate::error::Result;
use crate::future::TestbedFuture;
use crate::mock::Closeable;
use std::future::Future;

/// A client for the system under test and the handle that shuts it down.
pub struct ClientAndServer<C> {
    /// Client the test drives the system with.
    pub client: C,
    /// Closed by `all().after()`.
    pub server: Box<dyn Closeable>,
}

impl<C> ClientAndServer<C> {
    /// Pair a client with its server.
    pub fn new(client: C, server: impl Closeable + 'static) -> Self {
        Self {
            client,
            server: Box::new(server),
        }
    }

    /// A client with nothing to shut down, e.g. for an in-process system.
    pub fn client_only(client: C) -> Self {
        Self::new(client, NothingToClose)
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for ClientAndServer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAndServer")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

struct NothingToClose;

impl Closeable for NothingToClose {
    fn close(self: Box<Self>) -> TestbedFuture<'static, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Starts the system under test against the merged env.
///
/// Implemented for closures taking the env by value:
///
/// ```
/// use testbed_core::context::{ClientAndServer, SystemUnderTestProvider};
/// use testbed_core::TestbedError;
/// use testbed_core::env::EnvVars;
///
/// fn assert_provider<P: SystemUnderTestProvider<String>>(_: P) {}
///
/// assert_provider(|env: EnvVars| async move {
///     let base = env.get("API_URL").cloned().unwrap_or_default();
///     Ok::<_, TestbedError>(ClientAndServer::client_only(base))
/// });
/// ```
pub trait SystemUnderTestProvider<C>: Send + Sync {
    /// Start the system and return a client for it.
    fn provide<'a>(&'a self, env: &'a EnvVars) -> TestbedFuture<'a, ClientAndServer<C>>;
}

impl<C, F, Fut> SystemUnderTestProvider<C> for F
where
    F: Fn(EnvVars) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ClientAndServer<C>>> + Send + 'static,
{
    fn provide<'a>(&'a self, env: &'a EnvVars) -> TestbedFuture<'a, ClientAndServer<C>> {
        Box::pin((self)(env.clone()))
    }
}
