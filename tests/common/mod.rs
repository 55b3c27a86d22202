//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_core::{Notifier, OrchestratorBuilder, RequestOrchestrator};
use courier_types::{Credential, MemoryCredentialStore, OrchestratorSettings, RetrySettings};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Settings pointed at `server` with millisecond-scale retry delays.
pub fn settings(server: &MockServer) -> OrchestratorSettings {
    OrchestratorSettings::new(&server.uri())
        .unwrap()
        .with_retry(RetrySettings::new(3, Duration::from_millis(10)))
        .with_timeout(Duration::from_secs(5))
}

pub fn builder(server: &MockServer) -> OrchestratorBuilder {
    RequestOrchestrator::builder(settings(server))
}

pub fn orchestrator(server: &MockServer) -> RequestOrchestrator {
    builder(server).build().unwrap()
}

/// Store pre-loaded with `token`.
pub fn credentials(token: &str) -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::new(Credential::new(token)))
}

/// Collects every message it is asked to show.
#[derive(Default)]
pub struct RecordingNotifier(Mutex<Vec<String>>);

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

pub fn users_fixture() -> Value {
    json!([
        {
            "id": 1,
            "name": "Leanne Graham",
            "username": "Bret",
            "email": "Sincere@april.biz",
            "address": {
                "street": "Kulas Light",
                "suite": "Apt. 556",
                "city": "Gwenborough",
                "zipcode": "92998-3874",
                "geo": { "lat": "-37.3159", "lng": "81.1496" }
            },
            "phone": "1-770-736-8031 x56442",
            "website": "hildegard.org",
            "company": {
                "name": "Romaguera-Crona",
                "catchPhrase": "Multi-layered client-server neural-net",
                "bs": "harness real-time e-markets"
            }
        },
        {
            "id": 2,
            "name": "Ervin Howell",
            "username": "Antonette",
            "email": "Shanna@melissa.tv",
            "phone": "010-692-6593 x09125",
            "website": "anastasia.net"
        }
    ])
}

/// Mount `GET /users` answering with the fixture after `delay`.
pub async fn mount_users(server: &MockServer, delay: Duration, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(users_fixture())
                .set_delay(delay),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn received(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |requests| requests.len())
}
