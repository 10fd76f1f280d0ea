//! Stateful collaborators a system under test reads and writes.
//!
//! The traits here are the seams; the in-memory implementations back the
//! harness's own tests and suites that do not need the real service.

mod parameter;
mod table;

pub use parameter::{
    MemoryParameterStore, ParameterSetupParams, ParameterStore, ParameterStoreEnvSetup,
    ParameterStoreSetup, ParameterType,
};
pub use table::{KeySchema, MemoryTable, Row, RowKey, TableScanner, row};
