//! External resources with paired setup and teardown.
//!
//! Givens are run by the test context in its before-all and before-each
//! hooks. Each run is a teardown followed by a setup, so a Given must treat
//! teardown of a resource that does not exist as success.

use crate::error::Result;
use crate::future::TestbedFuture;
use futures::future::try_join_all;
use std::future::Future;
use std::sync::Arc;

/// An external resource the test depends on.
pub trait Given: Send + Sync {
    /// Create the resource.
    fn setup(&self) -> TestbedFuture<'_, ()>;

    /// Remove the resource. Must succeed when the resource is absent.
    fn teardown(&self) -> TestbedFuture<'_, ()>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "given"
    }
}

impl<G: Given + ?Sized> Given for Arc<G> {
    fn setup(&self) -> TestbedFuture<'_, ()> {
        (**self).setup()
    }

    fn teardown(&self) -> TestbedFuture<'_, ()> {
        (**self).teardown()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// How the Givens of one lifecycle boundary are run relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GivenOrder {
    /// All Givens reset concurrently. No ordering between them.
    #[default]
    Concurrent,
    /// Givens reset one after another in registration order.
    Sequential,
}

/// Reset every Given (teardown then setup) in the requested order.
pub async fn reset_all(givens: &[Box<dyn Given>], order: GivenOrder) -> Result<()> {
    match order {
        GivenOrder::Concurrent => {
            try_join_all(givens.iter().map(|given| reset(given.as_ref()))).await?;
        }
        GivenOrder::Sequential => {
            for given in givens {
                reset(given.as_ref()).await?;
            }
        }
    }
    Ok(())
}

async fn reset(given: &dyn Given) -> Result<()> {
    tracing::debug!(given = %given.name(), "Resetting given");
    given.teardown().await?;
    given.setup().await
}

/// A Given built from two async closures.
///
/// # Example
///
/// ```
/// use testbed_core::given::{FnGiven, Given};
///
/// let given = FnGiven::new(
///     "queue",
///     || async { Ok(()) },
///     || async { Ok(()) },
/// );
/// assert_eq!(given.name(), "queue");
/// ```
pub struct FnGiven<S, T> {
    name: String,
    setup: S,
    teardown: T,
}

impl<S, T> FnGiven<S, T> {
    /// Create a Given from setup and teardown closures.
    pub fn new<SF, TF>(name: impl Into<String>, setup: S, teardown: T) -> Self
    where
        S: Fn() -> SF + Send + Sync,
        SF: Future<Output = Result<()>> + Send + 'static,
        T: Fn() -> TF + Send + Sync,
        TF: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            setup,
            teardown,
        }
    }
}

impl<S, SF, T, TF> Given for FnGiven<S, T>
where
    S: Fn() -> SF + Send + Sync,
    SF: Future<Output = Result<()>> + Send + 'static,
    T: Fn() -> TF + Send + Sync,
    TF: Future<Output = Result<()>> + Send + 'static,
{
    fn setup(&self) -> TestbedFuture<'_, ()> {
        Box::pin((self.setup)())
    }

    fn teardown(&self) -> TestbedFuture<'_, ()> {
        Box::pin((self.teardown)())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestbedError;
    use parking_lot::Mutex;

    fn recording_given(
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    ) -> Box<dyn Given> {
        let setup_log = Arc::clone(&log);
        let teardown_log = log;
        Box::new(FnGiven::new(
            name,
            move || {
                let log = Arc::clone(&setup_log);
                async move {
                    log.lock().push(format!("{}:setup", name));
                    Ok(())
                }
            },
            move || {
                let log = Arc::clone(&teardown_log);
                async move {
                    log.lock().push(format!("{}:teardown", name));
                    Ok(())
                }
            },
        ))
    }

    #[tokio::test]
    async fn reset_runs_teardown_before_setup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let givens = vec![recording_given("table", Arc::clone(&log))];

        reset_all(&givens, GivenOrder::Concurrent).await.unwrap();

        assert_eq!(*log.lock(), vec!["table:teardown", "table:setup"]);
    }

    #[tokio::test]
    async fn sequential_order_follows_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let givens = vec![
            recording_given("first", Arc::clone(&log)),
            recording_given("second", Arc::clone(&log)),
        ];

        reset_all(&givens, GivenOrder::Sequential).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "first:teardown",
                "first:setup",
                "second:teardown",
                "second:setup"
            ]
        );
    }

    #[tokio::test]
    async fn failing_setup_propagates() {
        let givens: Vec<Box<dyn Given>> = vec![Box::new(FnGiven::new(
            "broken",
            || async {
                Err(TestbedError::Given {
                    name: "broken".to_string(),
                    phase: "setup",
                    cause: "nope".to_string(),
                })
            },
            || async { Ok(()) },
        ))];

        let err = reset_all(&givens, GivenOrder::Concurrent)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E302");
    }
}
