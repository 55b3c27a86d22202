//! HTTP transport for Courier.
//!
//! - [`TransportAdapter`] - sends one [`RequestDescriptor`] with bearer auth,
//!   per-request timeout and the retry policy, classifying every failure into
//!   a [`RequestError`]
//! - [`retry`] - linear-backoff retry loop over `reqwest`
//! - [`refresh`] - credential renewal ([`TokenRefresher`])

mod adapter;
pub mod refresh;
pub mod retry;

use std::time::Duration;

use futures_util::StreamExt;
use url::Url;

pub use adapter::TransportAdapter;
pub use courier_types;
pub use refresh::{HttpTokenRefresher, RefreshFut, StaticTokenRefresher, TokenRefresher};

pub(crate) use courier_types::{Credential, RequestDescriptor, RequestError};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 32;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Shared client settings. The per-request timeout is applied on each request.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
        .default_headers(default_headers)
        .build()
}

/// Resolve a request path against the base URL.
///
/// Absolute `http(s)` URLs pass through untouched; anything else is appended
/// to the base path with exactly one `/` between them.
pub fn resolve_url(base: &Url, path: &str) -> Result<Url, RequestError> {
    if let Ok(url) = Url::parse(path)
        && matches!(url.scheme(), "http" | "https")
    {
        return Ok(url);
    }
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| RequestError::invalid_request(format!("{path}: {e}")))
}

/// Read at most `MAX_ERROR_BODY_BYTES` of an error response for diagnostics.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
