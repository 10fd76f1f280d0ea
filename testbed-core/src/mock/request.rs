//! Normalised inbound requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An inbound request as seen by a mock server.
///
/// Transports normalise requests before handing them to the engine: the
/// method is lowercased, the url is path plus query, header names are
/// lowercased and the body is `None` when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// Lowercased method.
    pub method: String,
    /// Path and query.
    pub url: String,
    /// Headers keyed by lowercased name.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestInfo {
    /// Create a request with no headers and no body.
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_lowercase(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Set a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the body from raw bytes.
    pub fn with_raw_body(mut self, raw: &[u8]) -> Self {
        self.body = parse_body(raw);
        self
    }

    /// Headers as a JSON object, for header matchers.
    pub fn headers_value(&self) -> Value {
        Value::Object(
            self.headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Parse a raw payload: JSON when it parses, a JSON string otherwise.
pub fn parse_body(raw: &[u8]) -> Option<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(raw) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(raw).into_owned())),
    }
}
