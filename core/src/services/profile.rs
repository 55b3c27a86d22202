//! The signed-in user's `/user/profile` resource.
//!
//! This backend wraps every payload in an [`ApiEnvelope`]; a `success: false`
//! envelope arrives with HTTP 200 and is classified from its `code`.

use serde::{Deserialize, Serialize};

use courier_types::RequestError;

use super::ApiEnvelope;
use crate::RequestOrchestrator;

const PROFILE_PATH: &str = "/user/profile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
}

/// Editable profile fields. Unset fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileService {
    orchestrator: RequestOrchestrator,
}

impl ProfileService {
    #[must_use]
    pub fn new(orchestrator: RequestOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn profile(&self) -> Result<Profile, RequestError> {
        let envelope: ApiEnvelope<Profile> = self.orchestrator.get(PROFILE_PATH, None).await?;
        envelope.into_result().inspect_err(|_| {
            // The rejected envelope came back as a 2xx and was cached.
            self.orchestrator.invalidate_url(PROFILE_PATH);
        })
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, RequestError> {
        let body = serde_json::to_value(update)
            .map_err(|e| RequestError::invalid_request(e.to_string()))?;
        let envelope: ApiEnvelope<Profile> =
            self.orchestrator.put(PROFILE_PATH, Some(body)).await?;
        let profile = envelope.into_result()?;
        self.orchestrator.invalidate_url(PROFILE_PATH);
        Ok(profile)
    }
}
