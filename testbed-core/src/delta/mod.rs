//! Snapshot/delta protocol.
//!
//! A [`DeltaCalculator`] captures the state of an external store before a
//! test action and reports what the action changed afterwards. The test
//! context calls `snapshot` before and `diff` after every `when`.

mod event_store;
mod multi;
mod table;

pub use event_store::EventStoreDeltaCalculator;
pub use multi::MultiDeltaCalculator;
pub use table::{TableDeltaCalculator, TableDiff};

use crate::future::TestbedFuture;
use serde::Serialize;

/// Captures and compares state of an external store.
pub trait DeltaCalculator: Send + Sync {
    /// Captured state.
    type Snapshot: Serialize + Send + Sync + 'static;
    /// Change between two states.
    type Delta: Serialize + Send + 'static;

    /// Capture the current state.
    fn snapshot(&self) -> TestbedFuture<'_, Self::Snapshot>;

    /// Capture the current state and compare it with `before`.
    fn diff<'a>(&'a self, before: &'a Self::Snapshot) -> TestbedFuture<'a, Self::Delta>;
}

impl<D: DeltaCalculator + ?Sized> DeltaCalculator for Box<D> {
    type Snapshot = D::Snapshot;
    type Delta = D::Delta;

    fn snapshot(&self) -> TestbedFuture<'_, Self::Snapshot> {
        (**self).snapshot()
    }

    fn diff<'a>(&'a self, before: &'a Self::Snapshot) -> TestbedFuture<'a, Self::Delta> {
        (**self).diff(before)
    }
}

/// Empty snapshot and delta. Serialises as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NoDelta {}

/// Calculator used when a context tracks no external state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDeltaCalculator;

impl DeltaCalculator for NullDeltaCalculator {
    type Snapshot = NoDelta;
    type Delta = NoDelta;

    fn snapshot(&self) -> TestbedFuture<'_, NoDelta> {
        Box::pin(async { Ok(NoDelta {}) })
    }

    fn diff<'a>(&'a self, _before: &'a NoDelta) -> TestbedFuture<'a, NoDelta> {
        Box::pin(async { Ok(NoDelta {}) })
    }
}
