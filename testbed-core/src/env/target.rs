//! Where [`LocalEnvSetup`](super::LocalEnvSetup) writes env entries.
//!
//! A target applies a whole [`EnvVars`] set at once and hands back an
//! [`EnvSnapshot`] of what it overwrote, so teardown can restore exactly the
//! touched keys.

use super::EnvVars;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Values some env keys had before an [`EnvTarget::apply`].
///
/// `None` marks a key that was unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    previous: BTreeMap<String, Option<String>>,
}

impl EnvSnapshot {
    /// Keys covered by this snapshot.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.previous.keys().map(String::as_str)
    }

    /// Value `key` had before, if covered.
    pub fn previous(&self, key: &str) -> Option<Option<&str>> {
        self.previous.get(key).map(Option::as_deref)
    }

    /// Touched keys that had a value, with that value.
    pub fn existing(&self) -> EnvVars {
        self.previous
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Number of touched keys.
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    /// True when nothing was touched.
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    /// Fold a later snapshot in. Keys already covered keep their earlier value.
    pub fn absorb(&mut self, later: EnvSnapshot) {
        for (key, value) in later.previous {
            self.previous.entry(key).or_insert(value);
        }
    }

    fn record(&mut self, key: &str, value: Option<String>) {
        self.previous.insert(key.to_string(), value);
    }
}

/// A writable set of env vars.
pub trait EnvTarget: Send + Sync {
    /// Current value of `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write every entry and return what each touched key held before.
    fn apply(&self, entries: &EnvVars) -> EnvSnapshot;

    /// Put back the values in `snapshot`, unsetting keys that had none.
    fn restore(&self, snapshot: EnvSnapshot);
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvTarget for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn apply(&self, entries: &EnvVars) -> EnvSnapshot {
        let mut snapshot = EnvSnapshot::default();
        for (key, value) in entries {
            snapshot.record(key, std::env::var(key).ok());
            // SAFETY: env setup runs from the test context lifecycle hooks,
            // before the system under test is started or after it is stopped.
            unsafe { std::env::set_var(key, value) };
        }
        snapshot
    }

    fn restore(&self, snapshot: EnvSnapshot) {
        for (key, value) in snapshot.previous {
            // SAFETY: see `apply`.
            match value {
                Some(value) => unsafe { std::env::set_var(&key, value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}

/// An env map that never touches the process.
///
/// ```
/// use testbed_core::env::{EnvTarget, IsolatedEnv, env_vars};
///
/// let env = IsolatedEnv::new().with_var("REGION", "eu-west-1");
/// let snapshot = env.apply(&env_vars([("REGION", "us-east-1"), ("API_URL", "http://localhost:9000")]));
///
/// assert_eq!(env.get("REGION").as_deref(), Some("us-east-1"));
/// assert_eq!(snapshot.previous("API_URL"), Some(None));
///
/// env.restore(snapshot);
/// assert_eq!(env.get("REGION").as_deref(), Some("eu-west-1"));
/// assert_eq!(env.get("API_URL"), None);
/// ```
#[derive(Debug, Default)]
pub struct IsolatedEnv {
    entries: RwLock<EnvVars>,
}

impl IsolatedEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value.
    pub fn with_var(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.write().insert(key.into(), value.into());
        self
    }

    /// Copy of every entry.
    pub fn entries(&self) -> EnvVars {
        self.entries.read().clone()
    }
}

impl EnvTarget for IsolatedEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn apply(&self, entries: &EnvVars) -> EnvSnapshot {
        let mut current = self.entries.write();
        let mut snapshot = EnvSnapshot::default();
        for (key, value) in entries {
            let old = current.insert(key.clone(), value.clone());
            snapshot.record(key, old);
        }
        snapshot
    }

    fn restore(&self, snapshot: EnvSnapshot) {
        let mut current = self.entries.write();
        for (key, value) in snapshot.previous {
            match value {
                Some(value) => current.insert(key, value),
                None => current.remove(&key),
            };
        }
    }
}

impl<T: EnvTarget + ?Sized> EnvTarget for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn apply(&self, entries: &EnvVars) -> EnvSnapshot {
        (**self).apply(entries)
    }

    fn restore(&self, snapshot: EnvSnapshot) {
        (**self).restore(snapshot)
    }
}
