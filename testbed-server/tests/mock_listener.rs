//! Mock servers behind real hyper listeners.

use serde_json::json;
use std::sync::Arc;
use testbed_core::mock::{
    Expectation, ExpectedResponse, FailureReason, Matcher, MockHttpServer, MockServerConfig,
    PortAllocator, RequestMatcher,
};
use testbed_core::observability::init_test_tracing;
use testbed_server::HyperMockListenerFactory;

async fn listening(name: &str, ports: &PortAllocator) -> MockHttpServer {
    init_test_tracing();
    let server = MockHttpServer::new(
        MockServerConfig::new(name, format!("{}_URL", name.to_uppercase())),
        Arc::new(HyperMockListenerFactory),
        ports,
    )
    .unwrap();
    server.listen().await.unwrap();
    server
}

#[tokio::test]
async fn serves_expectation_as_json() {
    let ports = PortAllocator::range(19100..19110).unwrap();
    let server = listening("greeter", &ports).await;
    server.expect(Expectation::new(
        RequestMatcher::get("/hello"),
        ExpectedResponse::ok(json!({"mockResponse": "Hello I am a mocked server"})),
    ));

    let res = reqwest::get(format!("{}/hello", server.url())).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({"mockResponse": "Hello I am a mocked server"}));

    assert!(server.verify().is_ok());
    server.close().await.unwrap();
}

#[tokio::test]
async fn unexpected_request_is_404_and_recorded() {
    let ports = PortAllocator::range(19110..19120).unwrap();
    let server = listening("quiet", &ports).await;

    let res = reqwest::get(format!("{}/surprise?x=1", server.url()))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);
    assert!(res.bytes().await.unwrap().is_empty());

    let report = server.verify().unwrap_err();
    assert!(report.unmet.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reason, FailureReason::NoRemainingExpectations);
    let request = report.failed[0].request.as_ref().unwrap();
    assert_eq!(request.method, "get");
    assert_eq!(request.url, "/surprise?x=1");
    assert!(request.headers.contains_key("host"));
    assert_eq!(request.body, None);

    server.close().await.unwrap();
}

#[tokio::test]
async fn mismatched_body_is_400_with_diff() {
    let ports = PortAllocator::range(19120..19130).unwrap();
    let server = listening("orders", &ports).await;
    server.expect(Expectation::new(
        RequestMatcher::post("/orders").with_body(Matcher::has(json!({"sku": "A-1"}))),
        ExpectedResponse::json(201, json!({"id": 1})),
    ));

    let res = reqwest::Client::new()
        .post(format!("{}/orders", server.url()))
        .json(&json!({"sku": "B-2", "qty": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);

    let report = server.verify().unwrap_err();
    assert_eq!(report.failed[0].reason, FailureReason::ExpectationDidNotMatch);
    assert_eq!(
        report.failed[0].diff,
        Some(json!([{"path": "body.sku", "expected": "A-1", "actual": "B-2"}]))
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn body_factory_sees_the_request() {
    let ports = PortAllocator::range(19130..19140).unwrap();
    let server = listening("echo", &ports).await;
    server.stub(Expectation::new(
        RequestMatcher::post(Matcher::regex("^/echo/").unwrap()),
        ExpectedResponse::from_fn(200, |req| {
            json!({"url": req.url, "sent": req.body.clone()})
        }),
    ));

    let client = reqwest::Client::new();
    for n in 0..2 {
        let body: serde_json::Value = client
            .post(format!("{}/echo/{}", server.url(), n))
            .body("plain text")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"url": format!("/echo/{}", n), "sent": "plain text"}));
    }

    assert!(server.verify().is_ok());
    server.close().await.unwrap();
}

#[tokio::test]
async fn ambiguous_stubs_answer_500() {
    let ports = PortAllocator::range(19140..19150).unwrap();
    let server = listening("ambiguous", &ports).await;
    let stub = Expectation::new(RequestMatcher::get("/x"), ExpectedResponse::ok(json!(1)));
    server.stub(stub.clone()).stub(stub);

    let res = reqwest::get(format!("{}/x", server.url())).await.unwrap();
    assert_eq!(res.status().as_u16(), 500);
    assert!(res.text().await.unwrap().contains("More than one stub matches"));

    assert!(server.verify().is_ok());
    server.close().await.unwrap();
}

#[tokio::test]
async fn server_can_listen_again_after_close() {
    let ports = PortAllocator::range(19150..19160).unwrap();
    let server = listening("restart", &ports).await;
    server.close().await.unwrap();

    server.listen().await.unwrap();
    server.stub(Expectation::new(
        RequestMatcher::get("/up"),
        ExpectedResponse::status(204),
    ));
    let res = reqwest::get(format!("{}/up", server.url())).await.unwrap();
    assert_eq!(res.status().as_u16(), 204);
    server.close().await.unwrap();
}

#[tokio::test]
async fn close_drops_kept_alive_connections() {
    let ports = PortAllocator::range(19160..19170).unwrap();
    let server = listening("keepalive", &ports).await;
    server.stub(Expectation::new(
        RequestMatcher::get("/ping"),
        ExpectedResponse::status(204),
    ));
    let url = format!("{}/ping", server.url());

    let client = reqwest::Client::new();
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 204);
    assert_eq!(res.headers()["content-type"], "application/json");

    server.close().await.unwrap();

    assert!(client.get(&url).send().await.is_err());
}
