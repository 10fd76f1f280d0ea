//! Hyper transport for mock servers.

use crate::listener::serve;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Request, Response, StatusCode};
use std::collections::BTreeMap;
use testbed_core::error::{Result, TestbedError};
use testbed_core::future::TestbedFuture;
use testbed_core::mock::{
    HttpConfig, HttpListener, MockConfig, MockListenerFactory, MockResponse, RequestInfo,
    parse_body,
};

/// Starts a hyper listener per mock server.
#[derive(Debug, Default, Clone, Copy)]
pub struct HyperMockListenerFactory;

impl HyperMockListenerFactory {
    /// Create a factory.
    pub fn new() -> Self {
        Self
    }
}

impl MockListenerFactory for HyperMockListenerFactory {
    fn listen(
        &self,
        mock: MockConfig,
        http: HttpConfig,
    ) -> TestbedFuture<'_, Box<dyn HttpListener>> {
        Box::pin(async move {
            let name = mock.mock_server_name().to_string();
            let listener = serve(&http, &name, move |req| {
                let mock = mock.clone();
                async move { handle(&mock, req).await }
            })
            .await?;
            Ok(Box::new(listener) as Box<dyn HttpListener>)
        })
    }
}

async fn handle(mock: &MockConfig, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let request = match normalise(req).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(server = %mock.mock_server_name(), error = %e, "Failed to read request");
            return error_response(StatusCode::BAD_REQUEST, &e);
        }
    };

    tracing::debug!(
        server = %mock.mock_server_name(),
        method = %request.method,
        url = %request.url,
        "Mock server received request"
    );

    match mock.respond(&request) {
        Ok(response) => to_response(response),
        Err(e) => {
            tracing::error!(server = %mock.mock_server_name(), error = %e, "Mock server failed to respond");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

/// Convert a hyper request into the engine's normalised form.
pub async fn normalise(req: Request<Incoming>) -> Result<RequestInfo> {
    let (parts, body) = req.into_parts();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &parts.headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    let bytes = body
        .collect()
        .await
        .map_err(|e| TestbedError::Network {
            cause: format!("failed to read request body: {}", e),
        })?
        .to_bytes();

    Ok(RequestInfo {
        method: parts.method.as_str().to_ascii_lowercase(),
        url: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        headers,
        body: parse_body(&bytes),
    })
}

/// Convert the engine's response into a hyper response.
pub fn to_response(response: MockResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = match &response.body {
        Some(body) => match serde_json::to_vec(body) {
            Ok(json) => Bytes::from(json),
            Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
        },
        None => Bytes::new(),
    };
    let mut res = Response::new(Full::new(body));
    if response.json {
        res.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    *res.status_mut() = status;

    if let Some(text) = response.status_text.filter(|t| !t.is_empty()) {
        if status.canonical_reason() != Some(text.as_str()) {
            if let Ok(reason) = ReasonPhrase::try_from(text.into_bytes()) {
                res.extensions_mut().insert(reason);
            }
        }
    }
    res
}

fn error_response(status: StatusCode, error: &dyn std::fmt::Display) -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(Bytes::from(error.to_string())));
    *res.status_mut() = status;
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn configured_response_is_json() {
        let res = to_response(MockResponse::matched(
            200,
            "All good",
            Some(json!({"mockResponse": "hi"})),
        ));

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            res.extensions().get::<ReasonPhrase>().map(|r| r.as_bytes()),
            Some(&b"All good"[..])
        );
    }

    #[test]
    fn bodiless_matched_response_is_still_json() {
        let res = to_response(MockResponse::matched(204, "No Content", None));

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn recorded_failures_have_no_body() {
        let res = to_response(MockResponse::failure(
            404,
            "No remaining expectations or applicable stubs found",
        ));

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.headers().get(CONTENT_TYPE).is_none());
        assert_eq!(
            res.extensions().get::<ReasonPhrase>().map(|r| r.as_bytes()),
            Some(&b"No remaining expectations or applicable stubs found"[..])
        );
    }

    #[test]
    fn canonical_reason_is_not_overridden() {
        let res = to_response(MockResponse::matched(201, "Created", None));
        assert!(res.extensions().get::<ReasonPhrase>().is_none());
    }
}
