//! Fan-out over several named calculators.

use super::DeltaCalculator;
use crate::error::TestbedError;
use crate::future::TestbedFuture;
use futures::future::try_join_all;
use std::collections::BTreeMap;

/// Snapshots and diffs several sources concurrently.
///
/// Both the snapshot and the delta are maps from source name to the
/// source's own snapshot or delta.
pub struct MultiDeltaCalculator<D> {
    sources: BTreeMap<String, D>,
}

impl<D: DeltaCalculator> MultiDeltaCalculator<D> {
    /// No sources yet.
    pub fn new() -> Self {
        Self {
            sources: BTreeMap::new(),
        }
    }

    /// Add a named source. A source with the same name is replaced.
    pub fn with_source(mut self, name: impl Into<String>, calculator: D) -> Self {
        self.sources.insert(name.into(), calculator);
        self
    }

    /// Source names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

impl<D: DeltaCalculator> Default for MultiDeltaCalculator<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DeltaCalculator> FromIterator<(String, D)> for MultiDeltaCalculator<D> {
    fn from_iter<I: IntoIterator<Item = (String, D)>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().collect(),
        }
    }
}

impl<D: DeltaCalculator> DeltaCalculator for MultiDeltaCalculator<D> {
    type Snapshot = BTreeMap<String, D::Snapshot>;
    type Delta = BTreeMap<String, D::Delta>;

    fn snapshot(&self) -> TestbedFuture<'_, Self::Snapshot> {
        Box::pin(async move {
            let snapshots = try_join_all(self.sources.iter().map(|(name, calc)| async move {
                let snapshot = calc.snapshot().await.map_err(|e| {
                    if matches!(e, TestbedError::Snapshot { .. }) {
                        e
                    } else {
                        TestbedError::Snapshot {
                            source_name: name.clone(),
                            cause: e.to_string(),
                        }
                    }
                })?;
                Ok::<_, TestbedError>((name.clone(), snapshot))
            }))
            .await?;
            Ok(snapshots.into_iter().collect())
        })
    }

    fn diff<'a>(&'a self, before: &'a Self::Snapshot) -> TestbedFuture<'a, Self::Delta> {
        Box::pin(async move {
            let deltas = try_join_all(self.sources.iter().map(|(name, calc)| async move {
                let previous = before.get(name).ok_or_else(|| TestbedError::Diff {
                    source_name: name.clone(),
                    cause: "no snapshot taken for this source".to_string(),
                })?;
                Ok::<_, TestbedError>((name.clone(), calc.diff(previous).await?))
            }))
            .await?;
            Ok(deltas.into_iter().collect())
        })
    }
}
