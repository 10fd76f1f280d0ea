//! Error types for testbed.
//!
//! Hard failures (misconfiguration, lifecycle misuse, transport problems) are
//! returned immediately as [`TestbedError`]. Soft failures observed by a mock
//! server are recorded and only surface through [`VerificationFailure`] when
//! the server is verified.

use crate::mock::VerifyError;
use thiserror::Error;

/// The main error type for testbed operations.
#[derive(Error, Debug)]
pub enum TestbedError {
    // =========================================================================
    // Mock Engine Errors (E100-E199)
    // =========================================================================
    /// More than one stub structurally matches an inbound request.
    #[error("E101: More than one stub matches request {method} {url} on mock server {server}")]
    MultipleStubsMatch {
        /// Mock server that received the request.
        server: String,
        /// Lowercased request method.
        method: String,
        /// Request url.
        url: String,
    },

    /// Lookup of a mock server by name failed.
    #[error("E102: Can not find mock server using name {name}")]
    UnknownMockServer {
        /// The requested name.
        name: String,
    },

    /// `listen` was called on a mock server that is already listening.
    #[error("E103: Cant call listen on mock server {server} once listener already started")]
    ListenerAlreadyStarted {
        /// Mock server name.
        server: String,
    },

    /// `close` was called on a mock server that never started listening.
    #[error("E104: Unable to close mock server {server} because listener has not been started")]
    ListenerNotStarted {
        /// Mock server name.
        server: String,
    },

    /// Two mock servers share a name within one context.
    #[error("E105: Mock server name '{name}' is registered more than once")]
    DuplicateMockServer {
        /// The duplicated name.
        name: String,
    },

    /// Two mock servers publish their URL under the same env key.
    #[error("E106: Env key '{key}' is published by both mock server {first} and {second}")]
    DuplicateEnvKey {
        /// The env key.
        key: String,
        /// First mock server publishing the key.
        first: String,
        /// Second mock server publishing the key.
        second: String,
    },

    /// The port allocator has handed out every port in its range.
    #[error("E107: Port range {start}..{end} exhausted")]
    PortsExhausted {
        /// First port of the range.
        start: u16,
        /// End of the range (exclusive).
        end: u16,
    },

    /// Invalid matcher definition.
    #[error("E108: Invalid matcher '{pattern}': {cause}")]
    InvalidMatcher {
        /// The offending pattern.
        pattern: String,
        /// Reason the matcher is invalid.
        cause: String,
    },

    // =========================================================================
    // Verification Errors (E200-E299)
    // =========================================================================
    /// One or more mock servers failed verification.
    #[error("E201: {0}")]
    Verification(#[from] VerificationFailure),

    // =========================================================================
    // Environment / Given Errors (E300-E399)
    // =========================================================================
    /// Environment setup or teardown failed.
    #[error("E301: Environment {phase} failed: {cause}")]
    EnvSetup {
        /// "setup" or "teardown".
        phase: &'static str,
        /// Reason for the failure.
        cause: String,
    },

    /// A Given failed during setup or teardown.
    #[error("E302: Given '{name}' {phase} failed: {cause}")]
    Given {
        /// Name of the Given.
        name: String,
        /// "setup" or "teardown".
        phase: &'static str,
        /// Reason for the failure.
        cause: String,
    },

    /// Parameter store operation failed.
    #[error("E303: Parameter store operation on '{parameter}' failed: {cause}")]
    ParameterStore {
        /// Fully qualified parameter name.
        parameter: String,
        /// Reason for the failure.
        cause: String,
    },

    /// Parameter was not present in the store.
    #[error("E304: Parameter '{parameter}' not found")]
    ParameterNotFound {
        /// Fully qualified parameter name.
        parameter: String,
    },

    // =========================================================================
    // Delta Errors (E400-E499)
    // =========================================================================
    /// Capturing a snapshot failed.
    #[error("E401: Snapshot of '{source_name}' failed: {cause}")]
    Snapshot {
        /// Name of the snapshotted source.
        source_name: String,
        /// Reason for the failure.
        cause: String,
    },

    /// Computing a delta failed.
    #[error("E402: Diff of '{source_name}' failed: {cause}")]
    Diff {
        /// Name of the diffed source.
        source_name: String,
        /// Reason for the failure.
        cause: String,
    },

    /// A row is missing one of its key attributes.
    #[error("E403: Row in '{source_name}' has no key attribute '{attribute}'")]
    MissingKeyAttribute {
        /// Name of the source.
        source_name: String,
        /// The missing attribute.
        attribute: String,
    },

    // =========================================================================
    // Transport Errors (E500-E599)
    // =========================================================================
    /// Binding a listener failed.
    #[error("E501: Failed to bind {name} on {addr}: {cause}")]
    Bind {
        /// Listener name.
        name: String,
        /// Address that could not be bound.
        addr: String,
        /// Reason for the failure.
        cause: String,
    },

    /// Network error.
    #[error("E502: Network error: {cause}")]
    Network {
        /// Reason for the failure.
        cause: String,
    },

    /// Protocol not supported by the listener transport.
    #[error("E503: Protocol '{protocol}' is not supported by {transport}")]
    UnsupportedProtocol {
        /// Requested protocol.
        protocol: String,
        /// Transport that rejected it.
        transport: String,
    },

    /// Closing a listener or system-under-test failed.
    #[error("E504: Failed to close {name}: {cause}")]
    Close {
        /// Name of the resource.
        name: String,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Lifecycle / Configuration Errors (E600-E699)
    // =========================================================================
    /// Invalid configuration value.
    #[error("E601: Invalid configuration for '{field}': {cause}")]
    ConfigValue {
        /// The configuration field.
        field: String,
        /// Description of the problem.
        cause: String,
    },

    /// The system-under-test provider failed.
    #[error("E602: System under test could not be provided: {cause}")]
    SystemUnderTest {
        /// Reason for the failure.
        cause: String,
    },

    /// The context has already been closed by `all().after()`.
    #[error("E603: Test context is closed")]
    ContextClosed,

    /// JSON serialization failed.
    #[error("E604: Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TestbedError {
    /// Get the error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MultipleStubsMatch { .. } => "E101",
            Self::UnknownMockServer { .. } => "E102",
            Self::ListenerAlreadyStarted { .. } => "E103",
            Self::ListenerNotStarted { .. } => "E104",
            Self::DuplicateMockServer { .. } => "E105",
            Self::DuplicateEnvKey { .. } => "E106",
            Self::PortsExhausted { .. } => "E107",
            Self::InvalidMatcher { .. } => "E108",
            Self::Verification(_) => "E201",
            Self::EnvSetup { .. } => "E301",
            Self::Given { .. } => "E302",
            Self::ParameterStore { .. } => "E303",
            Self::ParameterNotFound { .. } => "E304",
            Self::Snapshot { .. } => "E401",
            Self::Diff { .. } => "E402",
            Self::MissingKeyAttribute { .. } => "E403",
            Self::Bind { .. } => "E501",
            Self::Network { .. } => "E502",
            Self::UnsupportedProtocol { .. } => "E503",
            Self::Close { .. } => "E504",
            Self::ConfigValue { .. } => "E601",
            Self::SystemUnderTest { .. } => "E602",
            Self::ContextClosed => "E603",
            Self::Serialization(_) => "E604",
        }
    }

    /// Check if this error signals harness misconfiguration rather than a
    /// failure of the system under test.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MultipleStubsMatch { .. }
                | Self::UnknownMockServer { .. }
                | Self::ListenerAlreadyStarted { .. }
                | Self::ListenerNotStarted { .. }
                | Self::DuplicateMockServer { .. }
                | Self::DuplicateEnvKey { .. }
                | Self::PortsExhausted { .. }
                | Self::InvalidMatcher { .. }
                | Self::UnsupportedProtocol { .. }
                | Self::ConfigValue { .. }
        )
    }

    /// Get the verification failure, if this error carries one.
    pub fn as_verification(&self) -> Option<&VerificationFailure> {
        match self {
            Self::Verification(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type alias using `TestbedError`.
pub type Result<T> = std::result::Result<T, TestbedError>;

/// Verification failures of one or more mock servers.
///
/// Every dirty server contributes one [`VerifyError`]. Servers that verified
/// cleanly are not listed.
#[derive(Debug, Clone)]
pub struct VerificationFailure {
    reports: Vec<VerifyError>,
}

impl VerificationFailure {
    /// Create a failure from per-server reports.
    pub fn new(reports: Vec<VerifyError>) -> Self {
        Self { reports }
    }

    /// Per-server reports.
    pub fn reports(&self) -> &[VerifyError] {
        &self.reports
    }

    /// Report for the named server.
    pub fn report(&self, server: &str) -> Option<&VerifyError> {
        self.reports.iter().find(|r| r.server() == server)
    }

    /// Consume into per-server reports.
    pub fn into_reports(self) -> Vec<VerifyError> {
        self.reports
    }
}

impl std::fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, report) in self.reports.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", report)?;
        }
        Ok(())
    }
}

impl std::error::Error for VerificationFailure {}

/// Error returned by `TestContext::when`.
///
/// The action's own error is carried unchanged in [`WhenError::Action`] so
/// callers can match on its type.
#[derive(Debug)]
pub enum WhenError<E> {
    /// The action failed. Mock verification still ran; its outcome is attached.
    Action {
        /// The error returned by the action.
        error: E,
        /// Verification failure observed while the action failed, if any.
        verification: Option<VerificationFailure>,
    },
    /// The action succeeded but at least one mock server failed verification.
    Verification(VerificationFailure),
    /// The harness itself failed (snapshot, diff, closed context). Mock
    /// verification still ran when the context was open; its outcome is attached.
    Harness {
        /// The harness error.
        error: TestbedError,
        /// Verification failure observed alongside the harness error, if any.
        verification: Option<VerificationFailure>,
    },
}

impl<E> WhenError<E> {
    /// The action error, if the action failed.
    pub fn action_error(&self) -> Option<&E> {
        match self {
            Self::Action { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Consume into the action error, if the action failed.
    pub fn into_action_error(self) -> Option<E> {
        match self {
            Self::Action { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The verification failure, whether or not the action failed too.
    pub fn verification(&self) -> Option<&VerificationFailure> {
        match self {
            Self::Action { verification, .. } | Self::Harness { verification, .. } => {
                verification.as_ref()
            }
            Self::Verification(failure) => Some(failure),
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for WhenError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Action {
                error,
                verification: None,
            } => write!(f, "Action failed: {}", error),
            Self::Action {
                error,
                verification: Some(failure),
            } => write!(f, "Action failed: {}\n{}", error, failure),
            Self::Verification(failure) => write!(f, "{}", failure),
            Self::Harness {
                error,
                verification: None,
            } => write!(f, "{}", error),
            Self::Harness {
                error,
                verification: Some(failure),
            } => write!(f, "{}\n{}", error, failure),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for WhenError<E> {}

impl<E> From<TestbedError> for WhenError<E> {
    fn from(error: TestbedError) -> Self {
        Self::Harness {
            error,
            verification: None,
        }
    }
}
