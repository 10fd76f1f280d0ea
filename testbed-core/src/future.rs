//! Boxed future alias shared by the async collaborator traits.

use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by Givens, env setups, delta calculators and listeners.
pub type TestbedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;
