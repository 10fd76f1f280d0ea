//! Mock expectation engine.
//!
//! Tests script the outbound calls a system under test makes. Each
//! [`MockHttpServer`] answers requests from a FIFO queue of
//! [`Expectation`]s, falls back to stubs, and records every request it could
//! not satisfy. [`MockHttpServer::verify`] reports what was left over.
//!
//! The engine is transport agnostic. A [`MockListenerFactory`] binds a real
//! listener and feeds requests in through [`MockConfig::respond`].

mod expectation;
mod failure;
mod listener;
mod matcher;
mod port;
mod request;
mod server;

pub use expectation::{
    BodyFactory, Expectation, ExpectedResponse, HttpMethod, RequestMatcher, ResponseBody,
};
pub use failure::{Failure, FailureReason, VerifyError};
pub use listener::{
    Closeable, HttpConfig, HttpListener, HttpMockConfig, MockListenerFactory, Protocol,
};
pub use matcher::{MatchResult, Matcher, Mismatch, ValuePredicate};
pub use port::PortAllocator;
pub use request::{RequestInfo, parse_body};
pub use server::{MockConfig, MockHttpServer, MockResponse, MockServerConfig};

#[cfg(test)]
pub(crate) mod test_support;
