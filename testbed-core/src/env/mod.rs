//! Environment configuration shared by the harness and the system under test.
//!
//! The test context merges its default env with every mock server's URL entry
//! and hands the result to an [`EnvSetup`] before the system under test starts.

mod local;
mod target;

pub use local::LocalEnvSetup;
pub use target::{EnvSnapshot, EnvTarget, IsolatedEnv, ProcessEnv};

use crate::future::TestbedFuture;
use std::collections::BTreeMap;

/// Environment entries keyed by env var name.
pub type EnvVars = BTreeMap<String, String>;

/// Build an [`EnvVars`] map from string pairs.
pub fn env_vars<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> EnvVars
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Applies and removes a set of env entries.
///
/// `teardown` must remove exactly the keys applied by the preceding `setup`
/// and be a no-op when nothing was applied.
pub trait EnvSetup: Send + Sync {
    /// Apply the entries.
    fn setup<'a>(&'a self, env: &'a EnvVars) -> TestbedFuture<'a, ()>;

    /// Remove the entries applied by the last `setup`.
    fn teardown(&self) -> TestbedFuture<'_, ()>;
}

/// Env setup that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEnvSetup;

impl EnvSetup for NullEnvSetup {
    fn setup<'a>(&'a self, _env: &'a EnvVars) -> TestbedFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn teardown(&self) -> TestbedFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Env configuration for a test context.
pub struct EnvConfig {
    /// Entries applied before mock server URLs are merged in.
    pub default_env: EnvVars,
    /// Where the merged entries are applied.
    pub env_setup: Box<dyn EnvSetup>,
}

impl EnvConfig {
    /// Create an env configuration.
    pub fn new(default_env: EnvVars, env_setup: impl EnvSetup + 'static) -> Self {
        Self {
            default_env,
            env_setup: Box::new(env_setup),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            default_env: EnvVars::new(),
            env_setup: Box::new(NullEnvSetup),
        }
    }
}

impl std::fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvConfig")
            .field("default_env", &self.default_env)
            .finish_non_exhaustive()
    }
}
