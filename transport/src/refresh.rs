//! Credential renewal.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::{Credential, RequestError, read_capped_error_body};

/// Refresh future type alias.
pub type RefreshFut<'a> =
    Pin<Box<dyn Future<Output = Result<Credential, RequestError>> + Send + 'a>>;

/// Obtains a new credential after the backend rejected the current one.
///
/// Implementations report failures as `RequestError::refresh_failed`.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(&'a self, expired: Option<&'a Credential>) -> RefreshFut<'a>;
}

/// Always hands out the same credential.
#[derive(Debug, Clone)]
pub struct StaticTokenRefresher {
    credential: Credential,
}

impl StaticTokenRefresher {
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl TokenRefresher for StaticTokenRefresher {
    fn refresh<'a>(&'a self, _expired: Option<&'a Credential>) -> RefreshFut<'a> {
        Box::pin(async move { Ok(self.credential.clone()) })
    }
}

/// POSTs to a refresh endpoint and reads the new token from its JSON reply.
///
/// Accepted shapes: `{"token": ..}`, `{"access_token": ..}` and
/// `{"data": {"token": ..}}`. The expired credential, if any, is sent as the
/// bearer. The whole exchange is bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpTokenRefresher {
    #[must_use]
    pub fn new(client: reqwest::Client, url: Url, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request(&self, expired: Option<&Credential>) -> Result<Credential, RequestError> {
        let mut builder = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&Value::Object(Map::new()));
        if let Some(expired) = expired {
            builder = builder.header(reqwest::header::AUTHORIZATION, expired.bearer_header());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RequestError::refresh_failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(RequestError::refresh_failed(format!("HTTP {status}: {body}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RequestError::refresh_failed(e.to_string()))?;
        extract_token(&payload)
            .and_then(Credential::new)
            .ok_or_else(|| RequestError::refresh_failed("refresh response carried no token"))
    }
}

impl TokenRefresher for HttpTokenRefresher {
    fn refresh<'a>(&'a self, expired: Option<&'a Credential>) -> RefreshFut<'a> {
        Box::pin(self.request(expired))
    }
}

fn extract_token(payload: &Value) -> Option<&str> {
    payload
        .get("token")
        .or_else(|| payload.get("access_token"))
        .or_else(|| payload.get("data").and_then(|data| data.get("token")))
        .and_then(Value::as_str)
}
