//! Bearer credentials and where they live.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// A bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank tokens; an empty bearer is never sent.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value.
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted>)")
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential store is malformed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Process-wide credential holder.
///
/// `load` is consulted before every attempt, so a `store` made by one
/// request's refresh is visible to the next attempt of every other request.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<Credential>;
    fn store(&self, credential: Credential) -> Result<(), CredentialError>;
    fn clear(&self) -> Result<(), CredentialError>;
}

/// Credential store with no persistence.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    current: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new(initial: Option<Credential>) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credential> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, credential: Credential) -> Result<(), CredentialError> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
