//! Credential refresh after 401.

use std::sync::Arc;
use std::time::Duration;

use courier_types::{CredentialStore, ErrorKind};
use courier_utils::FileCredentialStore;
use futures_util::future::join_all;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, credentials};

async fn mount_protected(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    mount_protected(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "new-token" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = credentials("old-token");
    let orchestrator = common::builder(&server)
        .credentials(store.clone())
        .build()
        .unwrap();

    let calls = (0..3).map(|i| orchestrator.get::<Value>("/me", Some(json!({ "n": i }))));
    for result in join_all(calls).await {
        assert_eq!(result.unwrap(), json!({ "id": 1 }));
    }

    assert_eq!(store.load().unwrap().expose_secret(), "new-token");
    assert_eq!(orchestrator.stats().refreshes, 1);
}

#[tokio::test]
async fn failed_refresh_rejects_every_waiter() {
    let server = MockServer::start().await;
    mount_protected(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let store = credentials("old-token");
    let orchestrator = common::builder(&server)
        .credentials(store.clone())
        .build()
        .unwrap();

    let calls = (0..3).map(|i| orchestrator.get::<Value>("/me", Some(json!({ "n": i }))));
    for result in join_all(calls).await {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RefreshFailed);
        assert_eq!(err.message(), "session expired, please log in again");
    }
    assert_eq!(store.load().unwrap().expose_secret(), "old-token");
}

#[tokio::test]
async fn second_401_after_refresh_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "t2" })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = common::builder(&server)
        .credentials(credentials("t1"))
        .build()
        .unwrap();

    let err = orchestrator.get::<Value>("/me", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.message(), "unauthorized, please log in");
}

#[tokio::test]
async fn custom_refresh_path_is_used() {
    let server = MockServer::start().await;
    mount_protected(&server).await;
    Mock::given(method("POST"))
        .and(path("/token/renew"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": "new-token" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = common::builder(&server)
        .credentials(credentials("old-token"))
        .refresh_path("/token/renew")
        .build()
        .unwrap();

    let me: Value = orchestrator.get("/me", None).await.unwrap();
    assert_eq!(me, json!({ "id": 1 }));
}

#[tokio::test]
async fn refreshed_token_is_written_to_the_credential_file() {
    let server = MockServer::start().await;
    mount_protected(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "new-token" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("credentials.json");
    std::fs::write(&file, r#"{"token": "old-token", "user": "bret"}"#).unwrap();
    let store = Arc::new(FileCredentialStore::open(&file).unwrap());
    let orchestrator = common::builder(&server)
        .credentials(store)
        .build()
        .unwrap();

    orchestrator.get::<Value>("/me", None).await.unwrap();

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(saved, json!({ "token": "new-token", "user": "bret" }));
}

#[tokio::test]
async fn stalled_refresh_endpoint_fails_within_the_request_timeout() {
    let server = MockServer::start().await;
    mount_protected(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "new-token" }))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    let settings = common::settings(&server).with_timeout(Duration::from_millis(200));
    let orchestrator = courier_core::RequestOrchestrator::builder(settings)
        .credentials(credentials("old-token"))
        .build()
        .unwrap();

    let calls = (0..2).map(|i| orchestrator.get::<Value>("/me", Some(json!({ "n": i }))));
    let results = tokio::time::timeout(Duration::from_secs(3), join_all(calls))
        .await
        .expect("refresh must give up after the request timeout");
    for result in results {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RefreshFailed);
    }

    let stats = orchestrator.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.refreshes, 1);
}
