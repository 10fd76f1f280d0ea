//! Env setup that writes entries into an [`EnvTarget`], by default the
//! process environment.

use super::{EnvSetup, EnvSnapshot, EnvTarget, EnvVars, ProcessEnv};
use crate::future::TestbedFuture;
use parking_lot::Mutex;

/// Applies env entries to the process (or another target) and restores the
/// previous values on teardown.
///
/// Keys outside the applied set are never touched. A key that did not exist
/// before `setup` is removed again by `teardown`; a key that did exist gets
/// its previous value back.
pub struct LocalEnvSetup<T: EnvTarget = ProcessEnv> {
    target: T,
    /// Value of every applied key before the first `setup`.
    touched: Mutex<EnvSnapshot>,
}

impl LocalEnvSetup<ProcessEnv> {
    /// Create a setup writing to the process environment.
    pub fn new() -> Self {
        Self::with_target(ProcessEnv)
    }
}

impl Default for LocalEnvSetup<ProcessEnv> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EnvTarget> LocalEnvSetup<T> {
    /// Create a setup writing to `target`.
    pub fn with_target(target: T) -> Self {
        Self {
            target,
            touched: Mutex::new(EnvSnapshot::default()),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Keys written since the last teardown, with the values they replaced.
    pub fn touched(&self) -> EnvSnapshot {
        self.touched.lock().clone()
    }
}

impl<T: EnvTarget> EnvSetup for LocalEnvSetup<T> {
    fn setup<'a>(&'a self, env: &'a EnvVars) -> TestbedFuture<'a, ()> {
        Box::pin(async move {
            let snapshot = self.target.apply(env);
            tracing::info!(
                keys = ?env.keys().collect::<Vec<_>>(),
                replaced = snapshot.existing().len(),
                "Env setup complete"
            );
            self.touched.lock().absorb(snapshot);
            Ok(())
        })
    }

    fn teardown(&self) -> TestbedFuture<'_, ()> {
        Box::pin(async move {
            let snapshot = std::mem::take(&mut *self.touched.lock());
            if snapshot.is_empty() {
                return Ok(());
            }
            tracing::info!(keys = ?snapshot.keys().collect::<Vec<_>>(), "Env teardown complete");
            self.target.restore(snapshot);
            Ok(())
        })
    }
}
