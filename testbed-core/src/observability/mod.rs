//! Logging for the harness and the suites that use it.
//!
//! Format and filter come from [`TracingConfig`], usually read from
//! `TESTBED_LOG_FORMAT` and `TESTBED_LOG_LEVEL` / `RUST_LOG`.

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::{TracingGuard, init_test_tracing, init_tracing};
