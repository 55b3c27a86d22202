use std::time::Duration;

use courier_types::{Method, RetrySettings};
use serde_json::Value;
use url::Url;

use crate::retry::{RetryOutcome, send_with_retry};
use crate::{Credential, RequestDescriptor, RequestError, read_capped_error_body, resolve_url};

/// Sends descriptors over HTTP and classifies the result.
///
/// Holds no per-request state, so one adapter is shared by every call.
#[derive(Debug, Clone)]
pub struct TransportAdapter {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    retry: RetrySettings,
}

impl TransportAdapter {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        timeout: Duration,
        retry: RetrySettings,
    ) -> Self {
        Self {
            client,
            base_url,
            timeout,
            retry,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send `descriptor`, retrying network and 5xx failures.
    ///
    /// An empty success body decodes as `Value::Null`.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        credential: Option<&Credential>,
    ) -> Result<Value, RequestError> {
        let mut url = resolve_url(&self.base_url, descriptor.url())?;
        let pairs = descriptor.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        let method = reqwest_method(descriptor.method());
        let timeout = descriptor.timeout().unwrap_or(self.timeout);

        let build = || {
            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .timeout(timeout);
            for (name, value) in descriptor.headers() {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(credential) = credential {
                builder =
                    builder.header(reqwest::header::AUTHORIZATION, credential.bearer_header());
            }
            if let Some(body) = descriptor.body() {
                builder = builder.json(body);
            }
            builder
        };

        match send_with_retry(build, &self.retry).await {
            RetryOutcome::Success(response) => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| RequestError::network(e.to_string()))?;
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Ok(Value::Null);
                }
                serde_json::from_slice(&bytes).map_err(|e| RequestError::decode(e.to_string()))
            }
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let body = read_capped_error_body(response).await;
                let err = RequestError::from_status(status, descriptor.url()).with_detail(body);
                tracing::warn!(
                    method = %descriptor.method(),
                    url = descriptor.url(),
                    status,
                    kind = %err.kind(),
                    "Request failed"
                );
                Err(err)
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                let err = classify_transport_error(&source);
                tracing::warn!(
                    method = %descriptor.method(),
                    url = descriptor.url(),
                    attempts,
                    error = %source,
                    "Request failed after retries"
                );
                Err(err)
            }
            RetryOutcome::NonRetryable(source) => {
                let err = if source.is_builder() {
                    RequestError::invalid_request(source.to_string())
                } else {
                    classify_transport_error(&source)
                };
                tracing::warn!(
                    method = %descriptor.method(),
                    url = descriptor.url(),
                    error = %source,
                    "Request failed"
                );
                Err(err)
            }
        }
    }
}

fn classify_transport_error(error: &reqwest::Error) -> RequestError {
    if error.is_timeout() {
        RequestError::timeout(error.to_string())
    } else {
        RequestError::network(error.to_string())
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}
