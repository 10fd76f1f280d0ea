//! Test context orchestrator.
//!
//! A [`TestContext`] ties the pieces of an integration suite together: the
//! merged env, the mock servers, the Givens, the system under test and the
//! delta calculator. Suites drive it through four hooks and `when`:
//!
//! ```text
//! build ─► all().before ─► each().before ─► when* ─► each().after ─► … ─► all().after
//! ```
//!
//! `when` verifies every mock server whatever the action returns, so a test
//! fails on an unexpected outbound call even if the response looked right.

mod builder;
mod provider;

pub use builder::{TestContextBuilder, merge_env};
pub use provider::{ClientAndServer, SystemUnderTestProvider};

use crate::delta::{DeltaCalculator, NullDeltaCalculator};
use crate::env::{EnvSetup, EnvVars};
use crate::error::{Result, TestbedError, VerificationFailure, WhenError};
use crate::given::{Given, GivenOrder, reset_all};
use crate::mock::{Closeable, Expectation, MockHttpServer};
use futures::future::{join_all, try_join_all};
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;

/// Where a context is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built, mock servers not started.
    Constructed,
    /// Mock servers listening, between test cases.
    SuiteReady,
    /// Inside a test case.
    CaseActive,
    /// Shut down by `all().after()`.
    Closed,
}

/// Result of a successful `when`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenResponse<R, Dl> {
    /// What the action returned.
    pub response: R,
    /// What the action changed.
    pub delta: Dl,
}

/// An integration test context.
pub struct TestContext<C, D: DeltaCalculator = NullDeltaCalculator> {
    env: EnvVars,
    env_setup: Box<dyn EnvSetup>,
    mock_servers: Vec<MockHttpServer>,
    client: Option<C>,
    server: Mutex<Option<Box<dyn Closeable>>>,
    delta: D,
    before_all: Vec<Box<dyn Given>>,
    before_each: Vec<Box<dyn Given>>,
    given_order: GivenOrder,
    lifecycle: Mutex<Lifecycle>,
}

impl<C, D: DeltaCalculator> TestContext<C, D> {
    /// The merged env handed to the env setup and the system under test.
    pub fn env(&self) -> &EnvVars {
        &self.env
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    /// Suite-level hooks.
    pub fn all(&self) -> Hooks<'_, C, D> {
        Hooks {
            ctx: self,
            scope: Scope::All,
        }
    }

    /// Case-level hooks.
    pub fn each(&self) -> Hooks<'_, C, D> {
        Hooks {
            ctx: self,
            scope: Scope::Each,
        }
    }

    /// Mock server access by name.
    pub fn http_mock(&self) -> HttpMock<'_> {
        HttpMock {
            servers: &self.mock_servers,
        }
    }

    /// Access to the system under test.
    pub fn api(&self) -> Api<'_, C> {
        Api {
            client: self.client.as_ref(),
        }
    }

    /// Run `action`, returning its response and the delta it caused.
    ///
    /// Every mock server is verified afterwards whatever the action returned.
    /// An action error is returned unchanged in [`WhenError::Action`] with
    /// any verification failure attached.
    pub async fn when<R, E, F, Fut>(
        &self,
        action: F,
    ) -> std::result::Result<WhenResponse<R, D::Delta>, WhenError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        E: Display,
    {
        self.ensure_open()?;

        let outcome = self.run_action(action).await;
        let verification = self.verify_all();

        match (outcome, verification) {
            (Ok(response), None) => Ok(response),
            (Ok(_), Some(failure)) => Err(WhenError::Verification(failure)),
            (Err(WhenError::Action { error, .. }), verification) => Err(WhenError::Action {
                error,
                verification,
            }),
            (Err(WhenError::Harness { error, .. }), verification) => Err(WhenError::Harness {
                error,
                verification,
            }),
            (Err(other), _) => Err(other),
        }
    }

    async fn run_action<R, E, F, Fut>(
        &self,
        action: F,
    ) -> std::result::Result<WhenResponse<R, D::Delta>, WhenError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        E: Display,
    {
        let before = self.delta.snapshot().await?;
        let response = match action().await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(error = %error, "Error in when");
                return Err(WhenError::Action {
                    error,
                    verification: None,
                });
            }
        };
        let delta = self.delta.diff(&before).await?;
        Ok(WhenResponse { response, delta })
    }

    /// Verify every mock server, collecting the reports of the dirty ones.
    fn verify_all(&self) -> Option<VerificationFailure> {
        let reports: Vec<_> = self
            .mock_servers
            .iter()
            .filter_map(|server| server.verify().err())
            .collect();

        if reports.is_empty() {
            None
        } else {
            for report in &reports {
                tracing::error!(server = %report.server(), report = %report, "Mock server verification failed");
            }
            Some(VerificationFailure::new(reports))
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.lifecycle() == Lifecycle::Closed {
            return Err(TestbedError::ContextClosed);
        }
        Ok(())
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        *self.lifecycle.lock() = lifecycle;
    }

    async fn before_all(&self) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("ctx.all.before started");

        try_join_all(
            self.mock_servers
                .iter()
                .filter(|server| !server.is_listening())
                .map(|server| server.listen()),
        )
        .await?;
        reset_all(&self.before_all, self.given_order).await?;

        self.set_lifecycle(Lifecycle::SuiteReady);
        tracing::debug!("ctx.all.before complete");
        Ok(())
    }

    async fn before_each(&self) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("ctx.each.before started");

        reset_all(&self.before_each, self.given_order).await?;

        self.set_lifecycle(Lifecycle::CaseActive);
        tracing::debug!("ctx.each.before complete");
        Ok(())
    }

    fn after_each(&self) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("ctx.each.after started");

        let verification = self.verify_all();
        self.set_lifecycle(Lifecycle::SuiteReady);

        tracing::debug!("ctx.each.after complete");
        match verification {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }

    async fn after_all(&self) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("ctx.all.after started");

        let server = self.server.lock().take();
        let close_sut = async move {
            if let Some(server) = server {
                match server.close().await {
                    Ok(()) => tracing::info!("System under test closed"),
                    Err(e) => tracing::error!(error = %e, "Error closing system under test"),
                }
            }
        };
        let close_mocks = join_all(
            self.mock_servers
                .iter()
                .filter(|server| server.is_listening())
                .map(|server| async move {
                    if let Err(e) = server.close().await {
                        tracing::error!(server = %server.name(), error = %e, "Error closing mock server");
                    }
                }),
        );
        futures::join!(close_sut, close_mocks);

        self.set_lifecycle(Lifecycle::Closed);
        self.env_setup
            .teardown()
            .await
            .map_err(builder::env_failure("teardown"))?;
        tracing::debug!("ctx.all.after complete");
        Ok(())
    }
}

impl<C, D: DeltaCalculator> std::fmt::Debug for TestContext<C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("env", &self.env)
            .field("mock_servers", &self.mock_servers)
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    All,
    Each,
}

/// `before` / `after` hooks of one scope.
pub struct Hooks<'a, C, D: DeltaCalculator> {
    ctx: &'a TestContext<C, D>,
    scope: Scope,
}

impl<C, D: DeltaCalculator> Hooks<'_, C, D> {
    /// `all`: start every mock server and reset the before-all Givens.
    /// `each`: reset the before-each Givens.
    pub async fn before(&self) -> Result<()> {
        match self.scope {
            Scope::All => self.ctx.before_all().await,
            Scope::Each => self.ctx.before_each().await,
        }
    }

    /// `all`: close the system under test and every mock server, then tear
    /// down the env. Close errors are logged, not returned.
    /// `each`: verify every mock server.
    pub async fn after(&self) -> Result<()> {
        match self.scope {
            Scope::All => self.ctx.after_all().await,
            Scope::Each => self.ctx.after_each(),
        }
    }
}

/// Mock server access by name.
pub struct HttpMock<'a> {
    servers: &'a [MockHttpServer],
}

impl<'a> HttpMock<'a> {
    /// The server called `name`.
    pub fn server(&self, name: &str) -> Result<&'a MockHttpServer> {
        self.servers
            .iter()
            .find(|server| server.name() == name)
            .ok_or_else(|| TestbedError::UnknownMockServer {
                name: name.to_string(),
            })
    }

    /// Queue an expectation on the server called `name`.
    pub fn expect(&self, name: &str, expectation: Expectation) -> Result<&'a MockHttpServer> {
        let server = self.server(name)?;
        server.expect(expectation);
        Ok(server)
    }

    /// Add a stub to the server called `name`.
    pub fn stub(&self, name: &str, stub: Expectation) -> Result<&'a MockHttpServer> {
        let server = self.server(name)?;
        server.stub(stub);
        Ok(server)
    }
}

/// Access to the system under test.
pub struct Api<'a, C> {
    client: Option<&'a C>,
}

impl<'a, C> Api<'a, C> {
    /// The client returned by the system-under-test provider.
    pub fn client(&self) -> Result<&'a C> {
        self.client.ok_or_else(|| TestbedError::SystemUnderTest {
            cause: "configure a system under test provider to use api().client()".to_string(),
        })
    }
}
