//! Delta of an append-only event store.

use super::DeltaCalculator;
use crate::error::Result;
use crate::future::TestbedFuture;
use crate::store::{KeySchema, Row, TableScanner};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Reports the events appended since the snapshot.
///
/// Events are never updated or deleted, so the delta is simply the rows
/// whose key was not present before, in scan order.
pub struct EventStoreDeltaCalculator {
    scanner: Arc<dyn TableScanner>,
    key: KeySchema,
}

impl EventStoreDeltaCalculator {
    /// Track `scanner` keyed on `PK` / `SK`.
    pub fn new(scanner: Arc<dyn TableScanner>) -> Self {
        Self::with_key(scanner, KeySchema::default())
    }

    /// Track `scanner` keyed on `key`.
    pub fn with_key(scanner: Arc<dyn TableScanner>, key: KeySchema) -> Self {
        Self { scanner, key }
    }

    /// Rows of `after` not present in `before`.
    pub fn appended(&self, before: &[Row], after: Vec<Row>) -> Result<Vec<Row>> {
        let table = self.scanner.table_name();
        let seen = before
            .iter()
            .map(|row| self.key.key_of(table, row))
            .collect::<Result<BTreeSet<_>>>()?;

        let mut appended = Vec::new();
        for row in after {
            if !seen.contains(&self.key.key_of(table, &row)?) {
                appended.push(row);
            }
        }
        Ok(appended)
    }
}

impl DeltaCalculator for EventStoreDeltaCalculator {
    type Snapshot = Vec<Row>;
    type Delta = Vec<Row>;

    fn snapshot(&self) -> TestbedFuture<'_, Vec<Row>> {
        self.scanner.scan()
    }

    fn diff<'a>(&'a self, before: &'a Vec<Row>) -> TestbedFuture<'a, Vec<Row>> {
        Box::pin(async move {
            let after = self.scanner.scan().await?;
            let appended = self.appended(before, after)?;
            tracing::debug!(
                table = %self.scanner.table_name(),
                appended = appended.len(),
                "Event store diff"
            );
            Ok(appended)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryTable, row};
    use serde_json::json;

    #[tokio::test]
    async fn only_new_events_are_reported() {
        let events = Arc::new(MemoryTable::new("events"));
        events
            .put(row(json!({"PK": "order-1", "SK": 0, "type": "Created"})))
            .unwrap();
        let calc = EventStoreDeltaCalculator::new(events.clone());
        let before = calc.snapshot().await.unwrap();

        events
            .put(row(json!({"PK": "order-1", "SK": 1, "type": "Paid"})))
            .unwrap();

        let delta = calc.diff(&before).await.unwrap();
        assert_eq!(
            delta,
            vec![row(json!({"PK": "order-1", "SK": 1, "type": "Paid"}))]
        );
    }

    #[tokio::test]
    async fn no_events_gives_empty_delta() {
        let calc = EventStoreDeltaCalculator::new(Arc::new(MemoryTable::new("events")));
        let before = calc.snapshot().await.unwrap();
        assert!(calc.diff(&before).await.unwrap().is_empty());
    }
}
