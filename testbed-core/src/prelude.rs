//! Prelude for convenient imports.
//!
//! ```ignore
//! use testbed_core::prelude::*;
//! ```

// Error handling
pub use crate::error::{Result, TestbedError, VerificationFailure, WhenError};

// Context
pub use crate::context::{
    ClientAndServer, Lifecycle, SystemUnderTestProvider, TestContext, TestContextBuilder,
    WhenResponse,
};

// Env and Givens
pub use crate::env::{EnvConfig, EnvSetup, EnvVars, LocalEnvSetup, env_vars};
pub use crate::given::{FnGiven, Given, GivenOrder};

// Mock servers
pub use crate::mock::{
    Closeable, Expectation, ExpectedResponse, Failure, FailureReason, HttpConfig, HttpListener,
    HttpMethod, Matcher, MockHttpServer, MockListenerFactory, MockServerConfig, PortAllocator,
    Protocol, RequestInfo, RequestMatcher, VerifyError,
};

// Deltas
pub use crate::delta::{
    DeltaCalculator, EventStoreDeltaCalculator, MultiDeltaCalculator, NoDelta,
    NullDeltaCalculator, TableDeltaCalculator, TableDiff,
};

// Stores and fixtures
pub use crate::fixture::{ClockProvider, FrozenClock, unique_string};
pub use crate::store::{MemoryTable, Row, TableScanner, row};
