//! HTTP retry policy with linear backoff.
//!
//! # Retry Policy
//!
//! - Max retries: 3 by default (4 total attempts)
//! - Delay before retry `n`: `delay * n` (1s, 2s, 3s by default)
//!
//! # Retryable Conditions
//!
//! - HTTP 5xx
//! - Connection errors and timeouts
//!
//! A connection dropped after it was established is not retried.
//!
//! Every attempt logs `method`, `url`, `status` and `duration_ms`.

use std::time::{Duration, Instant};

use courier_types::RetrySettings;
use reqwest::{RequestBuilder, Response, StatusCode};

/// Determine if a response status is retryable.
#[must_use]
pub fn should_retry(status: StatusCode) -> bool {
    status.is_server_error()
}

/// Delay before retry number `retry` (1-based).
#[must_use]
pub fn retry_delay(retry: u32, settings: &RetrySettings) -> Duration {
    settings.delay_for(retry)
}

/// Outcome of a retry operation.
///
/// Structurally distinguishes success from failure so callers cannot treat
/// an error response as success.
#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx response.
    Success(Response),
    /// Non-2xx response, either non-retryable or after exhausting retries.
    HttpError(Response),
    /// Transport failure after exhausting retries.
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
    /// Failure that retrying cannot fix (request construction, redirect loop, ...).
    NonRetryable(reqwest::Error),
}

impl RetryOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Send a request with automatic retries.
///
/// `build_request` is called once per attempt so each attempt gets a fresh
/// body and headers.
pub async fn send_with_retry<F>(build_request: F, settings: &RetrySettings) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        let (client, request) = build_request().build_split();
        let request = match request {
            Ok(request) => request,
            Err(e) => return RetryOutcome::NonRetryable(e),
        };
        let method = request.method().clone();
        let url = request.url().clone();
        let started = Instant::now();
        let result = client.execute(request).await;
        let duration_ms = started.elapsed().as_millis();
        let retries_left = attempt < settings.max_retries();

        match result {
            Ok(response) => {
                let status = response.status();
                tracing::debug!(
                    method = %method,
                    url = %url,
                    status = status.as_u16(),
                    duration_ms,
                    attempt,
                    "HTTP attempt finished"
                );

                if status.is_success() {
                    return RetryOutcome::Success(response);
                }
                if !(retries_left && should_retry(status)) {
                    return RetryOutcome::HttpError(response);
                }
            }
            Err(e) => {
                tracing::debug!(
                    method = %method,
                    url = %url,
                    error = %e,
                    duration_ms,
                    attempt,
                    "HTTP attempt failed"
                );

                if !is_retryable_error(&e) {
                    return RetryOutcome::NonRetryable(e);
                }
                if !retries_left {
                    return RetryOutcome::ConnectionError {
                        attempts: attempt + 1,
                        source: e,
                    };
                }
            }
        }

        attempt += 1;
        let delay = retry_delay(attempt, settings);
        tracing::debug!(
            url = %url,
            retry_count = attempt,
            delay_ms = delay.as_millis(),
            "Retrying request"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Only failures before a connection exists, or a stalled exchange, are
/// retried. A peer that drops an established connection may already have
/// acted on a non-idempotent request.
fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}
