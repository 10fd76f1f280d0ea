//! Expectations and stubs.
//!
//! An [`Expectation`] pairs a [`RequestMatcher`] with the
//! [`ExpectedResponse`] a mock server returns when the matcher passes. The
//! same type is used for stubs; only the way the server stores it differs.

use super::matcher::{MatchResult, Matcher};
use super::request::RequestInfo;
use crate::error::Result;
use http::{Method, StatusCode};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// HTTP method of an expected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// Lowercase name, as found in [`RequestInfo::method`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let method = Method::from_bytes(s.to_ascii_uppercase().as_bytes())
            .map_err(|_| format!("invalid HTTP method: {}", s))?;
        Self::try_from(&method)
    }
}

impl TryFrom<&Method> for HttpMethod {
    type Error = String;

    fn try_from(method: &Method) -> std::result::Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(Self::Get),
            Method::POST => Ok(Self::Post),
            Method::PUT => Ok(Self::Put),
            Method::PATCH => Ok(Self::Patch),
            Method::DELETE => Ok(Self::Delete),
            Method::HEAD => Ok(Self::Head),
            Method::OPTIONS => Ok(Self::Options),
            ref other => Err(format!("unknown HTTP method: {}", other.as_str().to_ascii_lowercase())),
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}

/// Structural matcher for an inbound request.
///
/// Method is compared for equality. Url is always checked; headers and body
/// are only checked when a matcher is set.
#[derive(Debug, Clone, Serialize)]
pub struct RequestMatcher {
    /// Expected method.
    pub method: HttpMethod,
    /// Url matcher.
    pub url: Matcher,
    /// Header matcher, applied to the lowercased header object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Matcher>,
    /// Body matcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Matcher>,
}

impl RequestMatcher {
    /// Match `method` on `url`.
    pub fn new(method: HttpMethod, url: impl Into<Matcher>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: None,
            body: None,
        }
    }

    /// Match a GET request.
    pub fn get(url: impl Into<Matcher>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Match a POST request.
    pub fn post(url: impl Into<Matcher>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Match a PUT request.
    pub fn put(url: impl Into<Matcher>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    /// Match a DELETE request.
    pub fn delete(url: impl Into<Matcher>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    /// Also match headers.
    pub fn with_headers(mut self, matcher: impl Into<Matcher>) -> Self {
        self.headers = Some(matcher.into());
        self
    }

    /// Also match the body.
    pub fn with_body(mut self, matcher: impl Into<Matcher>) -> Self {
        self.body = Some(matcher.into());
        self
    }

    /// Check a request, collecting every mismatch.
    pub fn check(&self, request: &RequestInfo) -> MatchResult {
        let mut mismatches = Vec::new();

        if request.method != self.method.as_str() {
            mismatches.push(super::matcher::Mismatch::new(
                "method",
                Value::String(self.method.as_str().to_string()),
                Value::String(request.method.clone()),
            ));
        }

        let url = Value::String(request.url.clone());
        mismatches.extend(self.url.check(Some(&url), "url"));

        if let Some(matcher) = &self.headers {
            let headers = request.headers_value();
            mismatches.extend(matcher.check(Some(&headers), "headers"));
        }

        if let Some(matcher) = &self.body {
            mismatches.extend(matcher.check(request.body.as_ref(), "body"));
        }

        MatchResult::new(mismatches)
    }
}

/// Produces a response body from the request that triggered it.
pub type BodyFactory = Arc<dyn Fn(&RequestInfo) -> Value + Send + Sync>;

/// Body of an expected response.
#[derive(Clone, Default)]
pub enum ResponseBody {
    /// No body.
    #[default]
    Empty,
    /// A fixed JSON value.
    Json(Value),
    /// Evaluated when the response is sent.
    Factory(BodyFactory),
}

impl ResponseBody {
    /// Render the body for `request`.
    pub fn render(&self, request: &RequestInfo) -> Option<Value> {
        match self {
            Self::Empty => None,
            Self::Json(value) => Some(value.clone()),
            Self::Factory(factory) => Some(factory(request)),
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(<factory>)"),
        }
    }
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Json(value) => value.serialize(serializer),
            Self::Factory(_) => serializer.serialize_str("<factory>"),
        }
    }
}

/// Response returned when an expectation matches.
#[derive(Debug, Clone)]
pub struct ExpectedResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase sent with the status.
    pub status_text: String,
    /// Body.
    pub body: ResponseBody,
}

impl ExpectedResponse {
    /// A response with `status` and no body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            body: ResponseBody::Empty,
        }
    }

    /// A response with `status` and a JSON body.
    pub fn json(status: u16, body: impl Into<Value>) -> Self {
        Self {
            body: ResponseBody::Json(body.into()),
            ..Self::status(status)
        }
    }

    /// A response whose JSON body is serialized from `body`.
    pub fn from_serialize<T: Serialize + ?Sized>(status: u16, body: &T) -> Result<Self> {
        Ok(Self::json(status, serde_json::to_value(body)?))
    }

    /// A `200 OK` response with a JSON body.
    pub fn ok(body: impl Into<Value>) -> Self {
        Self::json(200, body)
    }

    /// A response whose body is computed from the request.
    pub fn from_fn<F>(status: u16, factory: F) -> Self
    where
        F: Fn(&RequestInfo) -> Value + Send + Sync + 'static,
    {
        Self {
            body: ResponseBody::Factory(Arc::new(factory)),
            ..Self::status(status)
        }
    }

    /// Override the reason phrase.
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }
}

impl Serialize for ExpectedResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExpectedResponse", 3)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("statusText", &self.status_text)?;
        state.serialize_field("body", &self.body)?;
        state.end()
    }
}

fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("")
}

/// A request matcher and the response to send when it passes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    /// Matcher for the inbound request.
    pub request_matcher: RequestMatcher,
    /// Response sent on a match.
    pub response: ExpectedResponse,
}

impl Expectation {
    /// Create an expectation.
    pub fn new(request_matcher: RequestMatcher, response: ExpectedResponse) -> Self {
        Self {
            request_matcher,
            response,
        }
    }

    /// Check a request against the matcher.
    pub fn check(&self, request: &RequestInfo) -> MatchResult {
        self.request_matcher.check(request)
    }
}
