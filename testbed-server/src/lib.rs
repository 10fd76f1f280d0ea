//! Hyper transports for testbed.
//!
//! [`serve`] runs a plain HTTP/1 accept loop on a tokio listener and hands
//! every request to a handler. [`HyperMockListenerFactory`] uses it to put
//! mock servers on the network, and suites can use it to host the system
//! under test.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use testbed_core::mock::{MockHttpServer, MockServerConfig, PortAllocator};
//! use testbed_server::HyperMockListenerFactory;
//!
//! let ports = PortAllocator::default();
//! let payments = MockHttpServer::new(
//!     MockServerConfig::new("payments", "PAYMENTS_URL"),
//!     Arc::new(HyperMockListenerFactory),
//!     &ports,
//! )?;
//! payments.listen().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod listener;
mod mock;

pub use listener::{RunningListener, serve};
pub use mock::{HyperMockListenerFactory, normalise, to_response};
