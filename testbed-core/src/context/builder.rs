//! Builder for [`TestContext`].

use super::provider::SystemUnderTestProvider;
use super::{Lifecycle, TestContext};
use crate::delta::{DeltaCalculator, NullDeltaCalculator};
use crate::env::{EnvConfig, EnvSetup, EnvVars};
use crate::error::{Result, TestbedError};
use crate::given::{Given, GivenOrder};
use crate::mock::MockHttpServer;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

/// Configures and builds a [`TestContext`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use testbed_core::context::TestContextBuilder;
/// use testbed_core::env::{EnvConfig, LocalEnvSetup, env_vars};
///
/// # async fn example() -> testbed_core::Result<()> {
/// let ctx = TestContextBuilder::<()>::new()
///     .with_env_config(EnvConfig::new(
///         env_vars([("REGION", "ap-southeast-2")]),
///         LocalEnvSetup::new(),
///     ))
///     .build()
///     .await?;
///
/// ctx.all().before().await?;
/// # Ok(())
/// # }
/// ```
pub struct TestContextBuilder<C, D = NullDeltaCalculator> {
    env_config: EnvConfig,
    mock_servers: Vec<MockHttpServer>,
    provider: Option<Box<dyn SystemUnderTestProvider<C>>>,
    delta: D,
    before_all: Vec<Box<dyn Given>>,
    before_each: Vec<Box<dyn Given>>,
    given_order: GivenOrder,
}

impl<C> TestContextBuilder<C, NullDeltaCalculator> {
    /// Empty configuration: no env, no mocks, no system under test.
    pub fn new() -> Self {
        Self {
            env_config: EnvConfig::default(),
            mock_servers: Vec::new(),
            provider: None,
            delta: NullDeltaCalculator,
            before_all: Vec::new(),
            before_each: Vec::new(),
            given_order: GivenOrder::default(),
        }
    }
}

impl<C> Default for TestContextBuilder<C, NullDeltaCalculator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, D: DeltaCalculator> TestContextBuilder<C, D> {
    /// Default env and where to apply it.
    pub fn with_env_config(mut self, env_config: EnvConfig) -> Self {
        self.env_config = env_config;
        self
    }

    /// Replace the default env, keeping the env setup.
    pub fn with_default_env(mut self, default_env: EnvVars) -> Self {
        self.env_config.default_env = default_env;
        self
    }

    /// Replace the env setup, keeping the default env.
    pub fn with_env_setup(mut self, env_setup: impl EnvSetup + 'static) -> Self {
        self.env_config.env_setup = Box::new(env_setup);
        self
    }

    /// Track external state across `when` with `delta`.
    pub fn with_delta_calculator<D2: DeltaCalculator>(self, delta: D2) -> TestContextBuilder<C, D2> {
        TestContextBuilder {
            env_config: self.env_config,
            mock_servers: self.mock_servers,
            provider: self.provider,
            delta,
            before_all: self.before_all,
            before_each: self.before_each,
            given_order: self.given_order,
        }
    }

    /// Add a mock server.
    pub fn with_mock_server(mut self, server: MockHttpServer) -> Self {
        self.mock_servers.push(server);
        self
    }

    /// Start the system under test with `provider`.
    pub fn with_system_under_test(
        mut self,
        provider: impl SystemUnderTestProvider<C> + 'static,
    ) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Reset `given` in `all().before()`.
    pub fn before_all(mut self, given: impl Given + 'static) -> Self {
        self.before_all.push(Box::new(given));
        self
    }

    /// Reset `given` in `each().before()`.
    pub fn before_each(mut self, given: impl Given + 'static) -> Self {
        self.before_each.push(Box::new(given));
        self
    }

    /// How Givens of one hook run relative to each other.
    pub fn given_order(mut self, order: GivenOrder) -> Self {
        self.given_order = order;
        self
    }

    /// Merge the env, apply it and start the system under test.
    pub async fn build(self) -> Result<TestContext<C, D>> {
        let env = merge_env(&self.env_config.default_env, &self.mock_servers)?;
        let env_setup = self.env_config.env_setup;

        env_setup
            .teardown()
            .await
            .map_err(env_failure("teardown"))?;
        env_setup.setup(&env).await.map_err(env_failure("setup"))?;
        tracing::debug!(entries = env.len(), "Env applied");

        let (client, server) = match &self.provider {
            Some(provider) => match provider.provide(&env).await {
                Ok(sut) => (Some(sut.client), Some(sut.server)),
                Err(e) => {
                    tracing::error!(error = %e, "System under test failed to start");
                    if let Err(teardown) = env_setup.teardown().await {
                        tracing::warn!(error = %teardown, "Env teardown after failed start failed");
                    }
                    return Err(e);
                }
            },
            None => (None, None),
        };

        tracing::info!(
            mock_servers = self.mock_servers.len(),
            before_all = self.before_all.len(),
            before_each = self.before_each.len(),
            system_under_test = client.is_some(),
            "Test context built"
        );

        Ok(TestContext {
            env,
            env_setup,
            mock_servers: self.mock_servers,
            client,
            server: Mutex::new(server),
            delta: self.delta,
            before_all: self.before_all,
            before_each: self.before_each,
            given_order: self.given_order,
            lifecycle: Mutex::new(Lifecycle::Constructed),
        })
    }
}

/// Wrap an env setup failure with the phase it happened in.
pub(crate) fn env_failure(phase: &'static str) -> impl FnOnce(TestbedError) -> TestbedError {
    move |e| {
        if matches!(e, TestbedError::EnvSetup { .. }) {
            e
        } else {
            TestbedError::EnvSetup {
                phase,
                cause: e.to_string(),
            }
        }
    }
}

/// Merge `defaults` with the env entries of every mock server.
///
/// Mock entries override defaults. Duplicate mock names and env keys
/// published by two mock servers are rejected.
pub fn merge_env(defaults: &EnvVars, servers: &[MockHttpServer]) -> Result<EnvVars> {
    let mut names = HashSet::new();
    let mut publishers: BTreeMap<String, String> = BTreeMap::new();
    let mut env = defaults.clone();

    for server in servers {
        if !names.insert(server.name()) {
            return Err(TestbedError::DuplicateMockServer {
                name: server.name().to_string(),
            });
        }
        for (key, value) in server.env_entries() {
            if let Some(first) = publishers.insert(key.clone(), server.name().to_string()) {
                return Err(TestbedError::DuplicateEnvKey {
                    key,
                    first,
                    second: server.name().to_string(),
                });
            }
            if env.insert(key.clone(), value).is_some() {
                tracing::debug!(key = %key, server = %server.name(), "Mock server overrides default env");
            }
        }
    }
    Ok(env)
}
