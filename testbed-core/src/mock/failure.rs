//! Recorded failures and verification reports.

use super::expectation::Expectation;
use super::request::RequestInfo;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Why a request was recorded as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// No queued expectation and no matching stub.
    #[serde(rename = "No remaining expectations")]
    NoRemainingExpectations,
    /// The applicable expectation's matcher did not pass.
    #[serde(rename = "Expectation did not match")]
    ExpectationDidNotMatch,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRemainingExpectations => f.write_str("No remaining expectations"),
            Self::ExpectationDidNotMatch => f.write_str("Expectation did not match"),
        }
    }
}

/// A request a mock server could not satisfy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    /// Why the request failed.
    pub reason: FailureReason,
    /// The offending request, recorded when nothing was applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestInfo>,
    /// Matcher mismatches, recorded when an expectation did not match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Value>,
}

impl Failure {
    /// No expectation or stub was applicable to `request`.
    pub fn no_remaining_expectations(request: RequestInfo) -> Self {
        Self {
            reason: FailureReason::NoRemainingExpectations,
            request: Some(request),
            diff: None,
        }
    }

    /// The applicable expectation rejected the request.
    pub fn did_not_match(diff: Value) -> Self {
        Self {
            reason: FailureReason::ExpectationDidNotMatch,
            request: None,
            diff: Some(diff),
        }
    }
}

/// Verification report of one dirty mock server.
#[derive(Debug, Clone)]
pub struct VerifyError {
    server: String,
    /// Expectations still queued at verify time.
    pub unmet: Vec<Expectation>,
    /// Failures recorded since the previous verify.
    pub failed: Vec<Failure>,
}

impl VerifyError {
    /// Create a report.
    pub fn new(server: impl Into<String>, unmet: Vec<Expectation>, failed: Vec<Failure>) -> Self {
        Self {
            server: server.into(),
            unmet,
            failed,
        }
    }

    /// Name of the mock server.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Headline message.
    pub fn message(&self) -> String {
        format!("Verify for MockServer {} failed", self.server)
    }

    /// The report as a JSON document.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for VerifyError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("VerifyError", 3)?;
        state.serialize_field("message", &self.message())?;
        state.serialize_field("unmet", &self.unmet)?;
        state.serialize_field("failed", &self.failed)?;
        state.end()
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str(&self.message()),
        }
    }
}

impl std::error::Error for VerifyError {}
