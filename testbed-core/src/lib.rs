//! Testbed Core Library
//!
//! Runtime for integration tests of services that talk to other services
//! over HTTP and keep state in external stores.
//!
//! # Overview
//!
//! A suite describes its environment once, as a [`TestContext`]: the env the
//! system under test reads, the mock servers standing in for its HTTP
//! dependencies, the external resources it needs ([`Given`]s) and the state
//! it should be judged by ([`DeltaCalculator`]). Each test then scripts the
//! outbound calls it expects and runs one action through
//! [`TestContext::when`], which returns the action's response together with
//! the change it caused and fails on any unmet or unexpected call.
//!
//! # Key Components
//!
//! - **Mock**: FIFO expectations, stubs and verification for mock HTTP servers
//! - **Delta**: snapshot/diff of tables and event stores
//! - **Context**: lifecycle orchestration (`all`, `each`, `when`)
//! - **Env**: merged env applied to the process or a parameter store
//!
//! # Example
//!
//! ```ignore
//! use testbed_core::prelude::*;
//!
//! let ctx = TestContextBuilder::<RestClient>::new()
//!     .with_mock_server(payments)
//!     .with_system_under_test(provider)
//!     .build()
//!     .await?;
//!
//! ctx.all().before().await?;
//! ctx.http_mock().expect("payments", Expectation::new(
//!     RequestMatcher::post("/charges"),
//!     ExpectedResponse::ok(json!({"id": "ch_1"})),
//! ))?;
//!
//! let WhenResponse { response, delta } = ctx
//!     .when(|| ctx.api().client().unwrap().post("/orders", &order))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod delta;
pub mod env;
pub mod error;
pub mod fixture;
pub mod future;
pub mod given;
pub mod mock;
pub mod observability;
pub mod prelude;
pub mod store;

// Re-export key types at crate root for convenience
pub use context::{TestContext, TestContextBuilder, WhenResponse};
pub use delta::{DeltaCalculator, NullDeltaCalculator};
pub use error::{Result, TestbedError, VerificationFailure, WhenError};
pub use given::Given;
pub use mock::{Expectation, ExpectedResponse, MockHttpServer, RequestMatcher};
