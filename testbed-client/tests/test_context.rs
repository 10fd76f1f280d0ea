//! Full test-context runs against a real system under test.
//!
//! The system under test is a hyper app that forwards to whatever URL the
//! mock server published under `EnvKeyOne`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use serde_json::{Value, json};
use std::sync::Arc;
use testbed_client::{ClientError, RestClient, RestClientAndServerProvider, ServerStarter};
use testbed_core::env::{EnvTarget, EnvVars, IsolatedEnv, LocalEnvSetup, env_vars};
use testbed_core::future::TestbedFuture;
use testbed_core::mock::{
    Expectation, ExpectedResponse, FailureReason, HttpConfig, MockHttpServer, MockServerConfig,
    PortAllocator, RequestMatcher,
};
use testbed_core::observability::init_test_tracing;
use testbed_core::{DeltaCalculator, TestContext, TestContextBuilder, WhenError};
use testbed_server::{HyperMockListenerFactory, serve};

const ALIVE: &str = "yes I am alive AND LIFE IS GOOD!";
const MOCK_SERVER: &str = "HttpMockServer3";
const MOCKED_URL: &str = "/helloMockServer";

fn json_response(value: Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(value.to_string())));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn alive_app() -> impl ServerStarter {
    |http: HttpConfig, _env: EnvVars| async move {
        serve(&http, "api", |_req| async { json_response(json!(ALIVE)) }).await
    }
}

fn dependent_app(calls_dependency: bool) -> impl ServerStarter {
    move |http: HttpConfig, env: EnvVars| async move {
        let dependency = env.get("EnvKeyOne").cloned().unwrap_or_default();
        let client = reqwest::Client::new();
        serve(&http, "api", move |_req| {
            let url = format!("{}{}", dependency, MOCKED_URL);
            let client = client.clone();
            async move {
                let mock_response = if calls_dependency {
                    match client.get(&url).send().await {
                        Ok(res) => res.json::<Value>().await.unwrap_or(Value::Null),
                        Err(_) => Value::Null,
                    }
                } else {
                    Value::Null
                };
                json_response(json!({"serverResponse": ALIVE, "mockResponse": mock_response}))
            }
        })
        .await
    }
}

fn sut<S: ServerStarter + 'static>(starter: S) -> RestClientAndServerProvider<S> {
    RestClientAndServerProvider::new(starter).with_http(HttpConfig::localhost(0))
}

async fn context_with_mock(
    starter: impl ServerStarter + 'static,
    ports: &PortAllocator,
) -> TestContext<RestClient> {
    init_test_tracing();
    let mock = MockHttpServer::new(
        MockServerConfig::new(MOCK_SERVER, "EnvKeyOne"),
        Arc::new(HyperMockListenerFactory),
        ports,
    )
    .unwrap();

    TestContextBuilder::new()
        .with_default_env(env_vars([
            ("EnvKeyOne", "EnvValueOne"),
            ("EnvKeyTwo", "EnvValueTwo"),
        ]))
        .with_env_setup(LocalEnvSetup::with_target(Arc::new(IsolatedEnv::new())))
        .with_mock_server(mock)
        .with_system_under_test(sut(starter))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn server_config_only() {
    init_test_tracing();
    let ctx = TestContextBuilder::new()
        .with_system_under_test(sut(alive_app()))
        .build()
        .await
        .unwrap();

    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    let client = ctx.api().client().unwrap();
    let when = ctx.when(|| client.get::<String>("/")).await.unwrap();
    assert_eq!(when.response.status_code, 200);
    assert_eq!(when.response.result.as_deref(), Some(ALIVE));
    assert_eq!(serde_json::to_value(when.delta).unwrap(), json!({}));

    ctx.each().after().await.unwrap();
    ctx.all().after().await.unwrap();
}

struct CountingDelta;

impl DeltaCalculator for CountingDelta {
    type Snapshot = Value;
    type Delta = Value;

    fn snapshot(&self) -> TestbedFuture<'_, Value> {
        Box::pin(async { Ok(json!({"value": 1})) })
    }

    fn diff<'a>(&'a self, _before: &'a Value) -> TestbedFuture<'a, Value> {
        Box::pin(async { Ok(json!({"value": 2})) })
    }
}

#[tokio::test]
async fn server_config_env_config_and_delta() {
    init_test_tracing();
    let env = Arc::new(IsolatedEnv::new());
    let ctx = TestContextBuilder::new()
        .with_default_env(env_vars([
            ("EnvKeyOne", "EnvValueOne"),
            ("EnvKeyTwo", "EnvValueTwo"),
        ]))
        .with_env_setup(LocalEnvSetup::with_target(Arc::clone(&env)))
        .with_delta_calculator(CountingDelta)
        .with_system_under_test(sut(alive_app()))
        .build()
        .await
        .unwrap();
    assert_eq!(env.get("EnvKeyTwo").as_deref(), Some("EnvValueTwo"));

    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    let client = ctx.api().client().unwrap();
    let when = ctx.when(|| client.get::<String>("/")).await.unwrap();
    assert_eq!(when.delta, json!({"value": 2}));
    assert_eq!(when.response.result.as_deref(), Some(ALIVE));

    ctx.each().after().await.unwrap();
    ctx.all().after().await.unwrap();
    assert_eq!(env.get("EnvKeyOne"), None);
}

#[tokio::test]
async fn mock_with_no_expectation_and_no_calls() {
    let ports = PortAllocator::range(19200..19210).unwrap();
    let ctx = context_with_mock(dependent_app(false), &ports).await;

    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    let client = ctx.api().client().unwrap();
    let when = ctx.when(|| client.get::<Value>("/")).await.unwrap();
    assert_eq!(
        when.response.result,
        Some(json!({"serverResponse": ALIVE, "mockResponse": null}))
    );

    ctx.each().after().await.unwrap();
    ctx.all().after().await.unwrap();
}

#[tokio::test]
async fn mock_with_expectation_that_is_satisfied() {
    let ports = PortAllocator::range(19210..19220).unwrap();
    let ctx = context_with_mock(dependent_app(true), &ports).await;

    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    ctx.http_mock()
        .expect(
            MOCK_SERVER,
            Expectation::new(
                RequestMatcher::get(MOCKED_URL),
                ExpectedResponse::ok(json!("Hello I am a mocked server")),
            ),
        )
        .unwrap();

    let client = ctx.api().client().unwrap();
    let when = ctx.when(|| client.get::<Value>("/")).await.unwrap();
    assert_eq!(when.response.status_code, 200);
    assert_eq!(
        when.response.result,
        Some(json!({"serverResponse": ALIVE, "mockResponse": "Hello I am a mocked server"}))
    );
    assert_eq!(serde_json::to_value(when.delta).unwrap(), json!({}));

    ctx.each().after().await.unwrap();
    ctx.all().after().await.unwrap();
}

#[tokio::test]
async fn mock_with_unexpected_call_fails_verification() {
    let ports = PortAllocator::range(19220..19230).unwrap();
    let ctx = context_with_mock(dependent_app(true), &ports).await;

    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    let client = ctx.api().client().unwrap();
    let err = ctx.when(|| client.get::<Value>("/")).await.unwrap_err();

    let failure = match err {
        WhenError::Verification(failure) => failure,
        other => panic!("Expected verification failure, got {}", other),
    };
    let report = failure.report(MOCK_SERVER).unwrap();
    assert_eq!(report.message(), "Verify for MockServer HttpMockServer3 failed");
    assert!(report.unmet.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reason, FailureReason::NoRemainingExpectations);
    assert_eq!(report.to_json()["failed"][0]["reason"], "No remaining expectations");

    ctx.each().after().await.unwrap();
    ctx.all().after().await.unwrap();
}

#[tokio::test]
async fn mock_with_unmet_expectation_fails_verification() {
    let ports = PortAllocator::range(19230..19240).unwrap();
    let ctx = context_with_mock(dependent_app(false), &ports).await;

    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    ctx.http_mock()
        .expect(
            MOCK_SERVER,
            Expectation::new(
                RequestMatcher::get(MOCKED_URL),
                ExpectedResponse::ok(json!("never fetched")),
            ),
        )
        .unwrap();

    let client = ctx.api().client().unwrap();
    let err = ctx.when(|| client.get::<Value>("/")).await.unwrap_err();

    let failure = err.verification().unwrap();
    let report = failure.report(MOCK_SERVER).unwrap();
    assert_eq!(report.unmet.len(), 1);
    assert!(report.failed.is_empty());

    ctx.all().after().await.unwrap();
}

#[tokio::test]
async fn action_error_is_returned_unchanged() {
    let ports = PortAllocator::range(19240..19250).unwrap();
    let ctx = context_with_mock(alive_app(), &ports).await;

    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    let client = ctx.api().client().unwrap();
    let err = ctx
        .when(|| async {
            let response = client.get::<String>("/").await?;
            Err::<(), _>(ClientError::Api {
                status: 418,
                message: response.result.unwrap_or_default(),
            })
        })
        .await
        .unwrap_err();

    match err {
        WhenError::Action {
            error: ClientError::Api { status, message },
            verification,
        } => {
            assert_eq!(status, 418);
            assert_eq!(message, ALIVE);
            assert!(verification.is_none());
        }
        other => panic!("Expected action error, got {}", other),
    }

    ctx.all().after().await.unwrap();
}
