//! Bulk cancellation and disposal.

use std::time::Duration;

use courier_types::ErrorKind;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

async fn mount_slow(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])).set_delay(Duration::from_secs(5)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn cancel_all_rejects_every_subscriber_and_frees_slots() {
    let server = MockServer::start().await;
    mount_slow(&server).await;
    let orchestrator = common::orchestrator(&server);

    let mut tasks = Vec::new();
    // Three subscribers on one call, plus three more calls to fill and overflow the queue.
    for params in [None, None, None, Some(1), Some(2), Some(3)] {
        let orchestrator = orchestrator.clone();
        let params = params.map(|page| json!({ "page": page }));
        tasks.push(tokio::spawn(async move {
            orchestrator.get::<Value>("/slow", params).await
        }));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = orchestrator.stats();
    assert_eq!(stats.in_flight, 4);
    assert_eq!(stats.active, 3);
    assert_eq!(stats.queued, 1);

    assert_eq!(orchestrator.cancel_all_requests(), 4);

    for task in tasks {
        let err = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    let stats = orchestrator.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.cancellable, 0);

    // The orchestrator keeps working afterwards.
    let fast: Value = orchestrator.get("/fast", None).await.unwrap();
    assert_eq!(fast, json!({ "ok": true }));
}

#[tokio::test]
async fn cancel_all_with_nothing_pending_is_a_no_op() {
    let server = MockServer::start().await;
    mount_slow(&server).await;
    let orchestrator = common::orchestrator(&server);

    orchestrator.get::<Value>("/fast", None).await.unwrap();
    assert_eq!(orchestrator.cancel_all_requests(), 0);
    // Settled results stay cached.
    assert_eq!(orchestrator.stats().cached, 1);
}

#[tokio::test]
async fn dispose_cancels_pending_and_rejects_new_calls() {
    let server = MockServer::start().await;
    mount_slow(&server).await;
    let orchestrator = common::orchestrator(&server);
    orchestrator.get::<Value>("/fast", None).await.unwrap();

    let pending = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.get::<Value>("/slow", None).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    orchestrator.dispose();
    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let err = orchestrator.get::<Value>("/fast", None).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(orchestrator.stats().cached, 0);
}

#[tokio::test]
async fn instances_are_independent() {
    let server = MockServer::start().await;
    mount_slow(&server).await;
    let first = common::orchestrator(&server);
    let second = common::orchestrator(&server);

    let pending = tokio::spawn({
        let first = first.clone();
        async move { first.get::<Value>("/slow", None).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(second.cancel_all_requests(), 0);
    second.dispose();
    assert_eq!(first.stats().in_flight, 1);

    first.cancel_all_requests();
    assert!(pending.await.unwrap().unwrap_err().is_cancelled());
}

#[tokio::test]
async fn call_made_right_after_cancel_all_starts_fresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("stale")).set_delay(Duration::from_secs(5)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("fresh")))
        .mount(&server)
        .await;
    let orchestrator = common::orchestrator(&server);

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.get::<Value>("/report", None).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(orchestrator.stats().in_flight, 1);

    assert_eq!(orchestrator.cancel_all_requests(), 1);
    // Unlinked synchronously; no window where a new caller could join.
    assert_eq!(orchestrator.stats().in_flight, 0);

    let second: Value = tokio::time::timeout(Duration::from_secs(2), orchestrator.get("/report", None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, json!("fresh"));

    let err = first.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
