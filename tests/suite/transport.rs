//! Retry, classification and decoding through the full stack.

use std::time::Duration;

use courier_types::{ErrorKind, Method, RequestDescriptor};
use serde::Deserialize;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, credentials, received};

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;
    let orchestrator = common::orchestrator(&server);

    let value: Value = orchestrator.get("/flaky", None).await.unwrap();
    assert_eq!(value, json!({ "ok": true }));
    assert_eq!(received(&server).await, 3);
}

#[tokio::test]
async fn persistent_server_error_surfaces_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;
    let orchestrator = common::orchestrator(&server);

    let err = orchestrator.get::<Value>("/down", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.message(), "bad gateway");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .expect(1)
        .mount(&server)
        .await;
    let orchestrator = common::orchestrator(&server);

    let err = orchestrator.get::<Value>("/missing", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Client);
    assert_eq!(err.message(), "request address not found: /missing");
    assert_eq!(err.detail(), Some("no such thing"));
}

#[tokio::test]
async fn per_request_timeout_is_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sluggish"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    let orchestrator = common::orchestrator(&server);

    let descriptor = RequestDescriptor::new(Method::Get, "/sluggish")
        .unwrap()
        .with_timeout(Duration::from_millis(50));
    let err = orchestrator.request_value(descriptor).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.message(), "request timed out");
    assert_eq!(received(&server).await, 4);
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    // Nothing listens on port 1.
    let settings = courier_types::OrchestratorSettings::new("http://127.0.0.1:1")
        .unwrap()
        .with_retry(courier_types::RetrySettings::new(1, Duration::from_millis(10)));
    let orchestrator = courier_core::RequestOrchestrator::new(settings).unwrap();

    let err = orchestrator.get::<Value>("/users", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn params_bearer_and_body_reach_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/7"))
        .and(query_param("hard", "true"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let orchestrator = common::builder(&server)
        .credentials(credentials("abc"))
        .build()
        .unwrap();

    let value: Value = orchestrator
        .del("/users/7", Some(json!({ "hard": true })))
        .await
        .unwrap();
    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn payload_that_does_not_fit_the_type_is_a_decode_error() {
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Page {
        items: Vec<u32>,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
        .mount(&server)
        .await;
    let orchestrator = common::orchestrator(&server);

    let err = orchestrator.get::<Page>("/page", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}
