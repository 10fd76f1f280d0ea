//! Parameter store seams.
//!
//! [`ParameterStoreEnvSetup`] publishes a test context's env as parameters
//! under a path prefix, for systems under test that read configuration from
//! a parameter store rather than the process env. [`ParameterStoreSetup`]
//! is a [`Given`] for tests that need specific parameters to exist.

use crate::env::{EnvSetup, EnvVars};
use crate::error::{Result, TestbedError};
use crate::future::TestbedFuture;
use crate::given::Given;
use futures::future::try_join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a parameter value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParameterType {
    /// Plain text.
    #[default]
    String,
    /// Encrypted at rest.
    SecureString,
}

/// A hierarchical key/value parameter store.
pub trait ParameterStore: Send + Sync {
    /// Create or overwrite a parameter.
    fn put<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
        kind: ParameterType,
    ) -> TestbedFuture<'a, ()>;

    /// Read a parameter. Fails with `ParameterNotFound` when absent.
    fn get<'a>(&'a self, name: &'a str) -> TestbedFuture<'a, String>;

    /// Delete a parameter. Fails with `ParameterNotFound` when absent.
    fn delete<'a>(&'a self, name: &'a str) -> TestbedFuture<'a, ()>;
}

/// In-memory parameter store.
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    parameters: RwLock<BTreeMap<String, (String, ParameterType)>>,
}

impl MemoryParameterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every stored parameter.
    pub fn names(&self) -> Vec<String> {
        self.parameters.read().keys().cloned().collect()
    }

    /// Type of a stored parameter.
    pub fn kind(&self, name: &str) -> Option<ParameterType> {
        self.parameters.read().get(name).map(|(_, kind)| *kind)
    }
}

impl ParameterStore for MemoryParameterStore {
    fn put<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
        kind: ParameterType,
    ) -> TestbedFuture<'a, ()> {
        Box::pin(async move {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(TestbedError::ParameterStore {
                    parameter: name.to_string(),
                    cause: "name must be non-empty and contain no whitespace".to_string(),
                });
            }
            self.parameters
                .write()
                .insert(name.to_string(), (value.to_string(), kind));
            Ok(())
        })
    }

    fn get<'a>(&'a self, name: &'a str) -> TestbedFuture<'a, String> {
        Box::pin(async move {
            self.parameters
                .read()
                .get(name)
                .map(|(value, _)| value.clone())
                .ok_or_else(|| TestbedError::ParameterNotFound {
                    parameter: name.to_string(),
                })
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> TestbedFuture<'a, ()> {
        Box::pin(async move {
            match self.parameters.write().remove(name) {
                Some(_) => Ok(()),
                None => Err(TestbedError::ParameterNotFound {
                    parameter: name.to_string(),
                }),
            }
        })
    }
}

async fn put_logged(
    store: &dyn ParameterStore,
    name: &str,
    value: &str,
    kind: ParameterType,
) -> Result<()> {
    match store.put(name, value, kind).await {
        Ok(()) => {
            tracing::info!(parameter = %name, "Parameter added");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(parameter = %name, error = %e, "Error creating parameter");
            Err(e)
        }
    }
}

async fn delete_tolerant(store: &dyn ParameterStore, name: &str) -> Result<()> {
    match store.delete(name).await {
        Ok(()) | Err(TestbedError::ParameterNotFound { .. }) => {
            tracing::info!(parameter = %name, "Parameter removed");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Applies env entries as `<path>/<KEY>` parameters.
pub struct ParameterStoreEnvSetup {
    path: String,
    store: Arc<dyn ParameterStore>,
    applied: Mutex<Vec<String>>,
}

impl ParameterStoreEnvSetup {
    /// Publish entries under `path`. A trailing slash is ignored.
    pub fn new(path: impl Into<String>, store: Arc<dyn ParameterStore>) -> Self {
        let path: String = path.into();
        Self {
            path: path.trim_end_matches('/').to_string(),
            store,
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Parameter name for an env key.
    pub fn parameter_name(&self, key: &str) -> String {
        format!("{}/{}", self.path, key)
    }
}

impl EnvSetup for ParameterStoreEnvSetup {
    fn setup<'a>(&'a self, env: &'a EnvVars) -> TestbedFuture<'a, ()> {
        Box::pin(async move {
            tracing::debug!(path = %self.path, entries = env.len(), "Publishing env to parameter store");
            let names: Vec<(String, &String)> = env
                .iter()
                .map(|(key, value)| (self.parameter_name(key), value))
                .collect();

            try_join_all(names.iter().map(|(name, value)| async move {
                put_logged(self.store.as_ref(), name, value, ParameterType::String).await?;
                self.applied.lock().push(name.clone());
                Ok::<_, TestbedError>(())
            }))
            .await?;
            Ok(())
        })
    }

    fn teardown(&self) -> TestbedFuture<'_, ()> {
        Box::pin(async move {
            let applied = std::mem::take(&mut *self.applied.lock());
            for name in &applied {
                delete_tolerant(self.store.as_ref(), name).await?;
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for ParameterStoreEnvSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreEnvSetup")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// One parameter a [`ParameterStoreSetup`] creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSetupParams {
    /// Path prefix.
    pub path: String,
    /// Name below the path.
    pub var_name: String,
    /// Value.
    pub value: String,
    /// Storage type.
    pub kind: ParameterType,
}

impl ParameterSetupParams {
    /// Full parameter name.
    pub fn name(&self) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), self.var_name)
    }
}

/// Given creating a fixed list of parameters.
pub struct ParameterStoreSetup {
    store: Arc<dyn ParameterStore>,
    parameters: Vec<ParameterSetupParams>,
    created: Mutex<Vec<String>>,
}

impl ParameterStoreSetup {
    /// Create `parameters` in `store` on setup.
    pub fn new(store: Arc<dyn ParameterStore>, parameters: Vec<ParameterSetupParams>) -> Self {
        Self {
            store,
            parameters,
            created: Mutex::new(Vec::new()),
        }
    }

    /// The parameters this Given manages.
    pub fn parameters(&self) -> &[ParameterSetupParams] {
        &self.parameters
    }
}

impl Given for ParameterStoreSetup {
    fn setup(&self) -> TestbedFuture<'_, ()> {
        Box::pin(async move {
            try_join_all(self.parameters.iter().map(|param| async move {
                let name = param.name();
                put_logged(self.store.as_ref(), &name, &param.value, param.kind).await?;
                self.created.lock().push(name);
                Ok::<_, TestbedError>(())
            }))
            .await?;
            Ok(())
        })
    }

    fn teardown(&self) -> TestbedFuture<'_, ()> {
        Box::pin(async move {
            let created = std::mem::take(&mut *self.created.lock());
            tracing::debug!(parameters = created.len(), "Tearing down parameters");
            for name in &created {
                delete_tolerant(self.store.as_ref(), name).await?;
            }
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "parameter-store"
    }
}
