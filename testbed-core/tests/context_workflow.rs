//! A whole suite run through the test context without a network.
//!
//! Mock servers are reached through an in-process router keyed by the URL
//! each server publishes, so the same wiring a real transport would use is
//! exercised end to end: env merge, parameter store publishing, Givens,
//! `when` with a table delta and verification.

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use testbed_core::context::{ClientAndServer, Lifecycle};
use testbed_core::delta::{MultiDeltaCalculator, TableDeltaCalculator};
use testbed_core::env::{EnvConfig, EnvVars, env_vars};
use testbed_core::future::TestbedFuture;
use testbed_core::mock::{
    Closeable, Expectation, ExpectedResponse, FailureReason, HttpConfig, HttpListener, Matcher,
    MockConfig, MockHttpServer, MockListenerFactory, MockResponse, MockServerConfig,
    PortAllocator, RequestInfo, RequestMatcher,
};
use testbed_core::observability::init_test_tracing;
use testbed_core::store::{
    MemoryParameterStore, MemoryTable, ParameterStore, ParameterStoreEnvSetup, row,
};
use testbed_core::{TestContext, TestContextBuilder, TestbedError, WhenError};

type Routes = Arc<Mutex<HashMap<String, MockConfig>>>;

#[derive(Clone, Default)]
struct InProcessNetwork {
    routes: Routes,
}

impl InProcessNetwork {
    fn call(&self, base_url: &str, request: RequestInfo) -> MockResponse {
        let mock = self.routes.lock().get(base_url).cloned();
        match mock {
            Some(mock) => mock
                .respond(&request)
                .unwrap_or_else(|_| MockResponse::failure(500, "Internal Server Error")),
            None => MockResponse::failure(503, "Service Unavailable"),
        }
    }

    fn route_count(&self) -> usize {
        self.routes.lock().len()
    }
}

struct Route {
    url: String,
    routes: Routes,
}

impl Closeable for Route {
    fn close(self: Box<Self>) -> TestbedFuture<'static, ()> {
        Box::pin(async move {
            self.routes.lock().remove(&self.url);
            Ok(())
        })
    }
}

impl HttpListener for Route {
    fn on_url(&self) -> &str {
        &self.url
    }
}

impl MockListenerFactory for InProcessNetwork {
    fn listen(
        &self,
        mock: MockConfig,
        http: HttpConfig,
    ) -> TestbedFuture<'_, Box<dyn HttpListener>> {
        Box::pin(async move {
            let url = http.url();
            self.routes.lock().insert(url.clone(), mock);
            Ok(Box::new(Route {
                url,
                routes: Arc::clone(&self.routes),
            }) as Box<dyn HttpListener>)
        })
    }
}

/// The system under test: takes a payment, then records the order.
struct OrdersClient {
    network: InProcessNetwork,
    payments_url: String,
    orders: Arc<MemoryTable>,
    audit: Arc<MemoryTable>,
}

impl OrdersClient {
    async fn place_order(&self, id: &str, amount: u64) -> Result<Value, String> {
        let payment = self.network.call(
            &self.payments_url,
            RequestInfo::new("post", "/payments")
                .with_header("Content-Type", "application/json")
                .with_body(json!({"orderId": id, "amount": amount})),
        );
        if payment.status != 201 {
            return Err(format!("payment rejected with {}", payment.status));
        }

        self.orders
            .put(row(json!({"PK": format!("ORDER#{}", id), "SK": "v1", "amount": amount})))
            .map_err(|e| e.to_string())?;
        self.audit
            .put(row(json!({"PK": "AUDIT", "SK": id, "event": "placed"})))
            .map_err(|e| e.to_string())?;
        Ok(payment.body.unwrap_or(Value::Null))
    }
}

struct Suite {
    ctx: TestContext<OrdersClient, MultiDeltaCalculator<TableDeltaCalculator>>,
    network: InProcessNetwork,
    parameters: Arc<MemoryParameterStore>,
    orders: Arc<MemoryTable>,
}

async fn suite(ports: std::ops::Range<u16>) -> Suite {
    init_test_tracing();
    let network = InProcessNetwork::default();
    let parameters = Arc::new(MemoryParameterStore::new());
    let orders = Arc::new(
        MemoryTable::new("orders")
            .with_seed(vec![row(json!({"PK": "ORDER#seed", "SK": "v1", "amount": 1}))]),
    );
    let audit = Arc::new(MemoryTable::new("audit"));

    let payments = MockHttpServer::new(
        MockServerConfig::new("payments", "PAYMENTS_URL"),
        Arc::new(network.clone()),
        &PortAllocator::range(ports).unwrap(),
    )
    .unwrap();

    let delta = MultiDeltaCalculator::new()
        .with_source("orders", TableDeltaCalculator::new(orders.clone()))
        .with_source("audit", TableDeltaCalculator::new(audit.clone()));

    let sut = {
        let network = network.clone();
        let orders = Arc::clone(&orders);
        let audit = Arc::clone(&audit);
        move |env: EnvVars| {
            let client = OrdersClient {
                network: network.clone(),
                payments_url: env.get("PAYMENTS_URL").cloned().unwrap_or_default(),
                orders: Arc::clone(&orders),
                audit: Arc::clone(&audit),
            };
            async move { Ok::<_, TestbedError>(ClientAndServer::client_only(client)) }
        }
    };

    let ctx = TestContextBuilder::new()
        .with_env_config(EnvConfig::new(
            env_vars([("REGION", "ap-southeast-2")]),
            ParameterStoreEnvSetup::new("/orders/test/", parameters.clone()),
        ))
        .with_mock_server(payments)
        .with_delta_calculator(delta)
        .before_all(Arc::clone(&orders))
        .before_each(Arc::clone(&audit))
        .with_system_under_test(sut)
        .build()
        .await
        .unwrap();

    Suite {
        ctx,
        network,
        parameters,
        orders,
    }
}

fn payment_for(order_id: &str, status: u16) -> Expectation {
    Expectation::new(
        RequestMatcher::post("/payments").with_body(Matcher::has(json!({"orderId": order_id}))),
        ExpectedResponse::json(status, json!({"paymentId": format!("pay-{}", order_id)})),
    )
}

#[tokio::test]
async fn order_is_paid_and_recorded() {
    let Suite {
        ctx,
        network,
        parameters,
        orders,
    } = suite(9100..9110).await;

    assert_eq!(
        parameters.names(),
        vec!["/orders/test/PAYMENTS_URL", "/orders/test/REGION"]
    );
    assert_eq!(
        parameters.get("/orders/test/PAYMENTS_URL").await.unwrap(),
        "http://localhost:9100"
    );

    ctx.all().before().await.unwrap();
    assert_eq!(network.route_count(), 1);
    assert_eq!(orders.len(), 1);

    ctx.each().before().await.unwrap();
    ctx.http_mock()
        .expect("payments", payment_for("o-1", 201))
        .unwrap();

    let client = ctx.api().client().unwrap();
    let when = ctx.when(|| client.place_order("o-1", 42)).await.unwrap();

    assert_eq!(when.response, json!({"paymentId": "pay-o-1"}));
    let orders_delta = &when.delta["orders"];
    assert_eq!(orders_delta.added.len(), 1);
    assert_eq!(orders_delta.added[0]["PK"], "ORDER#o-1");
    assert!(orders_delta.removed.is_empty());
    assert!(orders_delta.changed.is_empty());
    assert_eq!(when.delta["audit"].added.len(), 1);

    ctx.each().after().await.unwrap();
    ctx.all().after().await.unwrap();

    assert_eq!(ctx.lifecycle(), Lifecycle::Closed);
    assert_eq!(network.route_count(), 0);
    assert!(parameters.names().is_empty());
}

#[tokio::test]
async fn rejected_payment_keeps_the_action_error() {
    let Suite { ctx, orders, .. } = suite(9110..9120).await;
    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    ctx.http_mock()
        .expect("payments", payment_for("o-2", 402))
        .unwrap();

    let client = ctx.api().client().unwrap();
    let err = ctx.when(|| client.place_order("o-2", 7)).await.unwrap_err();

    match err {
        WhenError::Action {
            error,
            verification,
        } => {
            assert_eq!(error, "payment rejected with 402");
            assert!(verification.is_none());
        }
        other => panic!("expected action error, got {}", other),
    }
    assert_eq!(orders.len(), 1);

    ctx.each().after().await.unwrap();
    ctx.all().after().await.unwrap();
}

#[tokio::test]
async fn wrong_order_id_is_reported_as_mismatch() {
    let Suite { ctx, .. } = suite(9120..9130).await;
    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    ctx.http_mock()
        .expect("payments", payment_for("o-3", 201))
        .unwrap();

    let client = ctx.api().client().unwrap();
    let err = ctx
        .when(|| client.place_order("o-999", 1))
        .await
        .unwrap_err();

    assert_eq!(err.action_error().map(String::as_str), Some("payment rejected with 400"));
    let report = err.verification().unwrap().report("payments").unwrap();
    assert!(report.unmet.is_empty());
    assert_eq!(report.failed[0].reason, FailureReason::ExpectationDidNotMatch);
    assert_eq!(
        report.failed[0].diff,
        Some(json!([{"path": "body.orderId", "expected": "o-3", "actual": "o-999"}]))
    );

    ctx.each().after().await.unwrap();
    ctx.all().after().await.unwrap();
}

#[tokio::test]
async fn unused_expectation_fails_after_each() {
    let Suite { ctx, .. } = suite(9130..9140).await;
    ctx.all().before().await.unwrap();
    ctx.each().before().await.unwrap();

    ctx.http_mock()
        .expect("payments", payment_for("o-4", 201))
        .unwrap();

    let err = ctx.each().after().await.unwrap_err();
    let failure = err.as_verification().unwrap();
    assert_eq!(failure.reports()[0].unmet.len(), 1);
    assert_eq!(ctx.lifecycle(), Lifecycle::SuiteReady);

    ctx.all().after().await.unwrap();
}
