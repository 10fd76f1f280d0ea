//! REST client and system-under-test provider for testbed contexts.
//!
//! [`RestClientAndServerProvider`] starts the system under test through a
//! [`ServerStarter`] and hands the test context a [`RestClient`] pointed at
//! the started listener.
//!
//! ```no_run
//! use testbed_client::{RestClient, RestClientAndServerProvider};
//! use testbed_core::TestContextBuilder;
//! use testbed_core::env::EnvVars;
//! use testbed_core::mock::HttpConfig;
//!
//! # async fn example() -> testbed_core::Result<()> {
//! let provider = RestClientAndServerProvider::new(|http: HttpConfig, _env: EnvVars| async move {
//!     testbed_server::serve(&http, "api", |_req| async {
//!         hyper::Response::new(http_body_util::Full::new(bytes::Bytes::from("\"ok\"")))
//!     })
//!     .await
//! })
//! .with_http(HttpConfig::localhost(0));
//!
//! let _ctx = TestContextBuilder::<RestClient>::new()
//!     .with_system_under_test(provider)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod error;
mod provider;

pub use client::{DEFAULT_TIMEOUT, RestClient, RestClientConfig, RestResponse};
pub use error::{ClientError, Result};
pub use provider::{DEFAULT_SUT_PORT, RestClientAndServerProvider, ServerStarter};
