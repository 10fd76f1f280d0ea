//! REST client for the system under test.

use crate::error::{ClientError, Result};
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings for [`RestClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestClientConfig {
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl RestClientConfig {
    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Status and decoded body of a response.
///
/// A 404 is not an error: it yields `result: None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse<T> {
    /// HTTP status code.
    pub status_code: u16,
    /// Decoded JSON body, `None` for 404 and empty bodies.
    pub result: Option<T>,
}

/// A JSON client bound to one base URL.
///
/// # Example
///
/// ```no_run
/// use testbed_client::RestClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RestClient::new("http://localhost:9999")?;
/// let response = client.get::<serde_json::Value>("/").await?;
/// assert_eq!(response.status_code, 200);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    http: HttpClient,
}

impl RestClient {
    /// Create a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(base_url, &RestClientConfig::default())
    }

    /// Create a client with `config`.
    pub fn with_config(base_url: impl Into<String>, config: &RestClientConfig) -> Result<Self> {
        let base_url = base_url.into();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let http = HttpClient::builder().timeout(config.timeout).build()?;
        tracing::info!(server_url = %base_url, "Client created");

        Ok(Self { base_url, http })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// GET `path`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<RestResponse<T>> {
        self.send(self.http.get(self.url(path))).await
    }

    /// POST `body` as JSON to `path`.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<RestResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    /// PUT `body` as JSON to `path`.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<RestResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.http.put(self.url(path)).json(body)).await
    }

    /// DELETE `path`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<RestResponse<T>> {
        self.send(self.http.delete(self.url(path))).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<RestResponse<T>> {
        let response = request.send().await?;
        tracing::debug!(url = %response.url(), status = response.status().as_u16(), "Response received");
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<RestResponse<T>> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(RestResponse {
                status_code: status.as_u16(),
                result: None,
            });
        }

        let body = response.bytes().await?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body).into_owned();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|json| {
                    json["error"]
                        .as_str()
                        .or_else(|| json["message"].as_str())
                        .map(str::to_string)
                })
                .unwrap_or(text);

            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let result = if body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(serde_json::from_slice(&body)?)
        };

        Ok(RestResponse {
            status_code: status.as_u16(),
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_invalid_url() {
        match RestClient::new("localhost:9999") {
            Err(ClientError::InvalidUrl(msg)) => assert!(msg.contains("http://")),
            other => panic!("Expected InvalidUrl error, got {:?}", other),
        }
    }

    #[test]
    fn test_url_building() {
        let client = RestClient::new("http://localhost:9999/").unwrap();
        assert_eq!(client.url("/"), "http://localhost:9999/");
        assert_eq!(client.url("orders/1"), "http://localhost:9999/orders/1");
        assert_eq!(client.url("/orders/1"), "http://localhost:9999/orders/1");
    }

    #[tokio::test]
    async fn test_get_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("alive")))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri()).unwrap();
        let response = client.get::<String>("/").await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.result.as_deref(), Some("alive"));
    }

    #[tokio::test]
    async fn test_not_found_is_empty_result() {
        let server = MockServer::start().await;

        let client = RestClient::new(server.uri()).unwrap();
        let response = client.get::<Value>("/missing").await.unwrap();

        assert_eq!(response.status_code, 404);
        assert_eq!(response.result, None);
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/orders/1"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"error": "Internal server error"})),
            )
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri()).unwrap();
        let err = client.delete::<Value>("/orders/1").await.unwrap_err();

        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal server error");
            }
            other => panic!("Expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_post_sends_json_and_tolerates_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(body_json(json!({"sku": "A-1"})))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri()).unwrap();
        let response = client
            .post::<_, Value>("/orders", &json!({"sku": "A-1"}))
            .await
            .unwrap();

        assert_eq!(response.status_code, 201);
        assert_eq!(response.result, None);
    }
}
