//! The `/users` resource.

use serde::{Deserialize, Serialize};

use courier_types::RequestError;

use crate::RequestOrchestrator;

/// A user record as the backend returns it.
///
/// Missing fields decode to their defaults: write endpoints echo back only
/// what was sent plus the assigned `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub address: Address,
    pub phone: String,
    pub website: String,
    pub company: Company,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
    pub geo: Geo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geo {
    pub lat: String,
    pub lng: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    pub catch_phrase: String,
    pub bs: String,
}

/// Fields for a new user. Unset fields are omitted from the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserService {
    orchestrator: RequestOrchestrator,
}

impl UserService {
    #[must_use]
    pub fn new(orchestrator: RequestOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn fetch_users(&self) -> Result<Vec<User>, RequestError> {
        self.orchestrator.get("/users", None).await
    }

    pub async fn fetch_user_by_id(&self, id: u64) -> Result<User, RequestError> {
        self.orchestrator.get(&format!("/users/{id}"), None).await
    }

    pub async fn create_user(&self, draft: &UserDraft) -> Result<User, RequestError> {
        let body = serde_json::to_value(draft)
            .map_err(|e| RequestError::invalid_request(e.to_string()))?;
        let user = self.orchestrator.post("/users", Some(body)).await?;
        // Listings cached before the write are stale now.
        self.orchestrator.invalidate_url("/users");
        Ok(user)
    }
}
