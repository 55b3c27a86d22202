//! The typed `/users` service.

use std::time::Duration;

use courier_core::{UserDraft, UserService};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, mount_users};

#[tokio::test]
async fn fetch_users_decodes_the_listing() {
    let server = MockServer::start().await;
    mount_users(&server, Duration::ZERO, 1).await;
    let service = UserService::new(common::orchestrator(&server));

    let users = service.fetch_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].company.catch_phrase, "Multi-layered client-server neural-net");
    assert_eq!(users[1].username, "Antonette");

    // Served from cache the second time.
    assert_eq!(service.fetch_users().await.unwrap(), users);
}

#[tokio::test]
async fn fetch_user_by_id_hits_the_item_route() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "name": "Clementine Bauch",
            "username": "Samantha"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let service = UserService::new(common::orchestrator(&server));

    let user = service.fetch_user_by_id(3).await.unwrap();
    assert_eq!(user.id, 3);
    assert_eq!(user.username, "Samantha");
}

#[tokio::test]
async fn create_user_posts_draft_and_invalidates_listing() {
    let server = MockServer::start().await;
    mount_users(&server, Duration::ZERO, 2).await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({ "name": "New", "email": "new@example.com" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 11,
            "name": "New",
            "email": "new@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let orchestrator = common::orchestrator(&server);
    let service = UserService::new(orchestrator.clone());

    service.fetch_users().await.unwrap();
    let draft = UserDraft {
        name: Some("New".into()),
        email: Some("new@example.com".into()),
        ..UserDraft::default()
    };
    let created = service.create_user(&draft).await.unwrap();
    assert_eq!(created.id, 11);
    assert_eq!(orchestrator.stats().cached, 0);

    service.fetch_users().await.unwrap();
}
