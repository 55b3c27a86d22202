//! The envelope-wrapped `/user/profile` service.

use courier_core::{ProfileService, ProfileUpdate};
use courier_types::ErrorKind;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn envelope(data: serde_json::Value) -> serde_json::Value {
    json!({ "code": 200, "data": data, "message": "ok", "success": true })
}

#[tokio::test]
async fn profile_unwraps_the_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "id": "u-1",
            "username": "admin",
            "avatar": "https://cdn.example.com/a.png",
            "role": "admin"
        }))))
        .expect(1)
        .mount(&server)
        .await;
    let service = ProfileService::new(common::orchestrator(&server));

    let profile = service.profile().await.unwrap();
    assert_eq!(profile.id, "u-1");
    assert_eq!(profile.role, "admin");
    assert_eq!(profile.email, None);

    // Cached like any other GET.
    assert_eq!(service.profile().await.unwrap(), profile);
}

#[tokio::test]
async fn rejected_envelope_is_classified_and_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 403,
            "data": null,
            "message": "profile is locked",
            "success": false
        })))
        .expect(2)
        .mount(&server)
        .await;
    let orchestrator = common::orchestrator(&server);
    let service = ProfileService::new(orchestrator.clone());

    let err = service.profile().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(err.message(), "profile is locked");
    assert_eq!(orchestrator.stats().cached, 0);

    // The next call goes back to the backend.
    assert_eq!(service.profile().await.unwrap_err().kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn update_profile_puts_fields_and_refreshes_the_cached_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "id": "u-1",
            "username": "admin",
            "role": "admin"
        }))))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/user/profile"))
        .and(body_json(json!({ "email": "admin@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "id": "u-1",
            "username": "admin",
            "email": "admin@example.com",
            "role": "admin"
        }))))
        .expect(1)
        .mount(&server)
        .await;
    let service = ProfileService::new(common::orchestrator(&server));

    service.profile().await.unwrap();
    let update = ProfileUpdate {
        email: Some("admin@example.com".into()),
        ..ProfileUpdate::default()
    };
    let updated = service.update_profile(&update).await.unwrap();
    assert_eq!(updated.email.as_deref(), Some("admin@example.com"));

    // The stale cached profile was dropped, so this hits the backend again.
    service.profile().await.unwrap();
}
