//! Value matchers used by request matchers.
//!
//! A [`Matcher`] checks one JSON value and reports every mismatch it finds
//! as a [`Mismatch`] with a dotted path, so a failed expectation can be
//! reported field by field.

use crate::error::{Result, TestbedError};
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

/// Predicate signature for [`Matcher::Predicate`].
pub type ValuePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A matcher for a single JSON value.
#[derive(Clone)]
pub enum Matcher {
    /// Matches anything, including an absent value.
    Any,
    /// Matches a structurally equal value.
    Equals(Value),
    /// Matches a string value against a regular expression.
    Regex(Regex),
    /// Matches a value that contains the expected value.
    ///
    /// Objects may carry extra keys; arrays must have the same length and
    /// each element must contain the expected element.
    Has(Value),
    /// Matches when the predicate returns true.
    Predicate {
        /// Human readable description used in reports.
        description: String,
        /// The predicate.
        check: ValuePredicate,
    },
}

impl Matcher {
    /// Match anything.
    pub fn any() -> Self {
        Self::Any
    }

    /// Match a structurally equal value.
    pub fn eq(value: impl Into<Value>) -> Self {
        Self::Equals(value.into())
    }

    /// Match strings against a regular expression.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| TestbedError::InvalidMatcher {
                pattern: pattern.to_string(),
                cause: e.to_string(),
            })
    }

    /// Match values containing `expected`.
    pub fn has(expected: impl Into<Value>) -> Self {
        Self::Has(expected.into())
    }

    /// Match values accepted by `check`.
    pub fn predicate<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// Check an optional value. An absent value is matched as `null`.
    pub fn check(&self, actual: Option<&Value>, path: &str) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();
        let actual = actual.unwrap_or(&Value::Null);
        self.collect(actual, path, &mut mismatches);
        mismatches
    }

    /// Whether `actual` matches.
    pub fn matches(&self, actual: &Value) -> bool {
        self.check(Some(actual), "").is_empty()
    }

    fn collect(&self, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
        match self {
            Self::Any => {}
            Self::Equals(expected) => {
                if expected != actual {
                    out.push(Mismatch::new(path, expected.clone(), actual.clone()));
                }
            }
            Self::Regex(re) => {
                let hit = actual.as_str().is_some_and(|s| re.is_match(s));
                if !hit {
                    out.push(Mismatch::new(path, self.describe(), actual.clone()));
                }
            }
            Self::Has(expected) => contains(expected, actual, path, out),
            Self::Predicate { check, .. } => {
                if !check(actual) {
                    out.push(Mismatch::new(path, self.describe(), actual.clone()));
                }
            }
        }
    }

    /// Describe the matcher as a JSON value for reports.
    pub fn describe(&self) -> Value {
        match self {
            Self::Any => Value::String("any".to_string()),
            Self::Equals(value) => value.clone(),
            Self::Regex(re) => serde_json::json!({ "regex": re.as_str() }),
            Self::Has(value) => serde_json::json!({ "has": value }),
            Self::Predicate { description, .. } => {
                serde_json::json!({ "predicate": description })
            }
        }
    }
}

fn contains(expected: &Value, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match (expected, actual) {
        (Value::Object(expected_map), Value::Object(actual_map)) => {
            for (key, expected_value) in expected_map {
                let child = join_path(path, key);
                match actual_map.get(key) {
                    Some(actual_value) => contains(expected_value, actual_value, &child, out),
                    None => out.push(Mismatch::new(&child, expected_value.clone(), Value::Null)),
                }
            }
        }
        (Value::Array(expected_items), Value::Array(actual_items))
            if expected_items.len() == actual_items.len() =>
        {
            for (i, (e, a)) in expected_items.iter().zip(actual_items).enumerate() {
                contains(e, a, &join_path(path, &i.to_string()), out);
            }
        }
        (e, a) if e == a => {}
        (e, a) => out.push(Mismatch::new(path, e.clone(), a.clone())),
    }
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Matcher({})", self.describe())
    }
}

impl Serialize for Matcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.describe().serialize(serializer)
    }
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Self::Equals(Value::String(value.to_string()))
    }
}

impl From<String> for Matcher {
    fn from(value: String) -> Self {
        Self::Equals(Value::String(value))
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Self::Equals(value)
    }
}

/// One difference between an expected and an actual value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    /// Dotted path to the value, e.g. `headers.x-api-key`.
    pub path: String,
    /// What was expected.
    pub expected: Value,
    /// What was received.
    pub actual: Value,
}

impl Mismatch {
    /// Create a mismatch.
    pub fn new(path: &str, expected: Value, actual: Value) -> Self {
        Self {
            path: path.to_string(),
            expected,
            actual,
        }
    }
}

/// Outcome of matching a request against a request matcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MatchResult {
    mismatches: Vec<Mismatch>,
}

impl MatchResult {
    /// Create a result from collected mismatches.
    pub fn new(mismatches: Vec<Mismatch>) -> Self {
        Self { mismatches }
    }

    /// Whether every matcher passed.
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// The mismatches.
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// The mismatches as a JSON value, as stored in a failure record.
    pub fn diff(&self) -> Value {
        serde_json::to_value(&self.mismatches).unwrap_or(Value::Null)
    }
}
