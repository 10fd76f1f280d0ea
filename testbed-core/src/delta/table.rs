//! Row-level diff of a keyed table.

use super::DeltaCalculator;
use crate::error::Result;
use crate::future::TestbedFuture;
use crate::store::{KeySchema, Row, RowKey, TableScanner};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Rows added, removed and changed between two scans.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableDiff {
    /// Rows whose key is new.
    pub added: Vec<Row>,
    /// Rows whose key disappeared, as they were before.
    pub removed: Vec<Row>,
    /// Rows present in both scans with different content, as they are now.
    pub changed: Vec<Row>,
}

impl TableDiff {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Diffs a table by its composite key.
pub struct TableDeltaCalculator {
    scanner: Arc<dyn TableScanner>,
    key: KeySchema,
}

impl TableDeltaCalculator {
    /// Diff `scanner` keyed on `PK` / `SK`.
    pub fn new(scanner: Arc<dyn TableScanner>) -> Self {
        Self::with_key(scanner, KeySchema::default())
    }

    /// Diff `scanner` keyed on `key`.
    pub fn with_key(scanner: Arc<dyn TableScanner>, key: KeySchema) -> Self {
        Self { scanner, key }
    }

    fn index<'r>(&self, rows: &'r [Row]) -> Result<BTreeMap<RowKey, &'r Row>> {
        let table = self.scanner.table_name();
        rows.iter()
            .map(|row| Ok((self.key.key_of(table, row)?, row)))
            .collect()
    }

    /// Compare two scans.
    pub fn compare(&self, before: &[Row], after: &[Row]) -> Result<TableDiff> {
        let before_index = self.index(before)?;
        let after_index = self.index(after)?;

        let mut diff = TableDiff::default();
        for (key, row) in &after_index {
            match before_index.get(key) {
                None => diff.added.push((*row).clone()),
                Some(previous) if previous != row => diff.changed.push((*row).clone()),
                Some(_) => {}
            }
        }
        for (key, row) in &before_index {
            if !after_index.contains_key(key) {
                diff.removed.push((*row).clone());
            }
        }
        Ok(diff)
    }
}

impl DeltaCalculator for TableDeltaCalculator {
    type Snapshot = Vec<Row>;
    type Delta = TableDiff;

    fn snapshot(&self) -> TestbedFuture<'_, Vec<Row>> {
        self.scanner.scan()
    }

    fn diff<'a>(&'a self, before: &'a Vec<Row>) -> TestbedFuture<'a, TableDiff> {
        Box::pin(async move {
            let after = self.scanner.scan().await?;
            let diff = self.compare(before, &after)?;
            tracing::debug!(
                table = %self.scanner.table_name(),
                added = diff.added.len(),
                removed = diff.removed.len(),
                changed = diff.changed.len(),
                "Table diff"
            );
            Ok(diff)
        })
    }
}

impl std::fmt::Debug for TableDeltaCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDeltaCalculator")
            .field("table", &self.scanner.table_name())
            .field("key", &self.key)
            .finish()
    }
}
