//! Tables of JSON rows keyed by a partition and a sort attribute.

use crate::error::{Result, TestbedError};
use crate::future::TestbedFuture;
use crate::given::Given;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};

/// A table row.
pub type Row = Map<String, Value>;

/// Names of the two key attributes of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition key attribute.
    pub partition: String,
    /// Sort key attribute.
    pub sort: String,
}

impl KeySchema {
    /// Key on `partition` and `sort`.
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Composite key of `row`.
    pub fn key_of(&self, table: &str, row: &Row) -> Result<RowKey> {
        let attribute = |name: &str| {
            row.get(name)
                .map(Value::to_string)
                .ok_or_else(|| TestbedError::MissingKeyAttribute {
                    source_name: table.to_string(),
                    attribute: name.to_string(),
                })
        };
        Ok(RowKey {
            partition: attribute(&self.partition)?,
            sort: attribute(&self.sort)?,
        })
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new("PK", "SK")
    }
}

/// Identity of a row: its two key attributes, rendered as JSON.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowKey {
    /// Partition key value.
    pub partition: String,
    /// Sort key value.
    pub sort: String,
}

/// Reads every row of a table.
pub trait TableScanner: Send + Sync {
    /// Name used in logs and errors.
    fn table_name(&self) -> &str;

    /// Full scan.
    fn scan(&self) -> TestbedFuture<'_, Vec<Row>>;
}

/// In-memory table.
///
/// As a [`Given`] the table clears itself on teardown and writes its seed
/// rows on setup.
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    key: KeySchema,
    rows: RwLock<Vec<Row>>,
    seed: Vec<Row>,
}

impl MemoryTable {
    /// Empty table keyed on `PK` / `SK`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_key(name, KeySchema::default())
    }

    /// Empty table with a custom key schema.
    pub fn with_key(name: impl Into<String>, key: KeySchema) -> Self {
        Self {
            name: name.into(),
            key,
            rows: RwLock::new(Vec::new()),
            seed: Vec::new(),
        }
    }

    /// Rows written on every setup.
    pub fn with_seed(mut self, rows: Vec<Row>) -> Self {
        self.seed = rows;
        self
    }

    /// Key schema.
    pub fn key(&self) -> &KeySchema {
        &self.key
    }

    /// Insert or replace the row with the same key.
    pub fn put(&self, row: Row) -> Result<()> {
        let key = self.key.key_of(&self.name, &row)?;
        let mut rows = self.rows.write();
        let existing = rows
            .iter()
            .position(|r| self.key.key_of(&self.name, r).is_ok_and(|k| k == key));
        match existing {
            Some(index) => rows[index] = row,
            None => rows.push(row),
        }
        Ok(())
    }

    /// Remove the row with `partition` / `sort`. Returns whether it existed.
    pub fn delete(&self, partition: &Value, sort: &Value) -> bool {
        let key = RowKey {
            partition: partition.to_string(),
            sort: sort.to_string(),
        };
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|r| self.key.key_of(&self.name, r).map_or(true, |k| k != key));
        rows.len() != before
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Remove every row.
    pub fn clear(&self) {
        self.rows.write().clear();
    }
}

impl TableScanner for MemoryTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn scan(&self) -> TestbedFuture<'_, Vec<Row>> {
        let rows = self.rows.read().clone();
        Box::pin(async move { Ok(rows) })
    }
}

impl Given for MemoryTable {
    fn setup(&self) -> TestbedFuture<'_, ()> {
        Box::pin(async move {
            for row in &self.seed {
                self.put(row.clone())?;
            }
            Ok(())
        })
    }

    fn teardown(&self) -> TestbedFuture<'_, ()> {
        Box::pin(async move {
            self.clear();
            Ok(())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a [`Row`] from a JSON object literal. Non-objects give an empty row.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
