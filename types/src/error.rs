//! Classified request failures.

use std::fmt;

use thiserror::Error;

/// Failure taxonomy shared by every layer of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response: connection failure or timeout.
    Network,
    /// 5xx response.
    Server,
    /// 4xx response other than 401/403.
    Client,
    /// 401 response that survived credential recovery.
    Unauthorized,
    /// 403 response.
    Forbidden,
    /// Aborted by the caller (cancel-all or dispose).
    Cancelled,
    /// The credential refresh itself failed.
    RefreshFailed,
    /// Response payload did not match the expected shape.
    Decode,
    /// Request could not be constructed.
    InvalidRequest,
}

impl ErrorKind {
    /// Classify an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            500..=599 => Self::Server,
            _ => Self::Client,
        }
    }

    /// Network and server failures are retried by the transport.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Server)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Client => "client",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Cancelled => "cancelled",
            Self::RefreshFailed => "refresh_failed",
            Self::Decode => "decode",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing message for an HTTP status.
#[must_use]
pub fn status_message(status: u16, url: &str) -> String {
    match status {
        400 => "bad request".to_string(),
        401 => "unauthorized, please log in".to_string(),
        403 => "access denied".to_string(),
        404 => format!("request address not found: {url}"),
        408 => "request timed out".to_string(),
        500 => "internal server error".to_string(),
        502 => "bad gateway".to_string(),
        503 => "service unavailable".to_string(),
        504 => "gateway timeout".to_string(),
        _ => "network request failed".to_string(),
    }
}

const NO_PERMISSION: &str = "no permission";

/// A classified failure.
///
/// `Clone` so one settlement can fan out to every collapsed subscriber.
/// `message` is safe to show to users; `detail` carries diagnostics
/// (transport error text, capped response body) for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
    detail: Option<String>,
}

impl RequestError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            detail: None,
        }
    }

    /// Classify a non-success HTTP status for `url`.
    #[must_use]
    pub fn from_status(status: u16, url: &str) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            message: status_message(status, url),
            detail: None,
        }
    }

    #[must_use]
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, "network request failed").with_detail(detail)
    }

    #[must_use]
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, "request timed out").with_detail(detail)
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "request cancelled")
    }

    #[must_use]
    pub fn refresh_failed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::RefreshFailed, "session expired, please log in again")
            .with_detail(detail)
    }

    #[must_use]
    pub fn decode(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, "unexpected response format").with_detail(detail)
    }

    #[must_use]
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(ErrorKind::InvalidRequest, format!("invalid request: {detail}"))
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.trim().is_empty() {
            self.detail = Some(detail);
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Message to surface through the notifier, if this failure warrants one.
    ///
    /// Forbidden always reads "no permission". Caller-initiated cancellation,
    /// credential failures and local decode/construction errors stay silent.
    #[must_use]
    pub fn notification(&self) -> Option<&str> {
        match self.kind {
            ErrorKind::Forbidden => Some(NO_PERMISSION),
            ErrorKind::Client | ErrorKind::Server | ErrorKind::Network => Some(&self.message),
            ErrorKind::Unauthorized
            | ErrorKind::Cancelled
            | ErrorKind::RefreshFailed
            | ErrorKind::Decode
            | ErrorKind::InvalidRequest => None,
        }
    }
}

impl From<crate::DescriptorError> for RequestError {
    fn from(err: crate::DescriptorError) -> Self {
        Self::invalid_request(err.to_string())
    }
}
