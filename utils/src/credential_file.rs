//! File-backed credential store.
//!
//! The file is a flat JSON object; the bearer lives under `"token"`. Other
//! keys are preserved on rewrite so the file can be shared with other tools.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use courier_types::{Credential, CredentialError, CredentialStore};
use serde_json::{Map, Value};

use crate::atomic_write::{AtomicWriteOptions, atomic_write};

const TOKEN_KEY: &str = "token";

/// Persists the current credential to disk and mirrors it in memory.
///
/// Every `load` re-reads the file, so a token written by another process is
/// picked up on the next call. The mirror answers only when the file exists
/// but cannot be read or parsed.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    credential: Option<Credential>,
    extra: Map<String, Value>,
}

impl FileCredentialStore {
    /// Open the store at `path`. A missing file means "no credential".
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let state = read_state(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &StoreState) -> Result<(), CredentialError> {
        let mut doc = state.extra.clone();
        if let Some(credential) = &state.credential {
            doc.insert(
                TOKEN_KEY.to_string(),
                Value::String(credential.expose_secret().to_string()),
            );
        }
        let bytes = serde_json::to_vec_pretty(&Value::Object(doc))?;
        atomic_write(&self.path, &bytes, AtomicWriteOptions::default())?;
        Ok(())
    }
}

fn read_state(path: &Path) -> Result<StoreState, CredentialError> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(StoreState::default()),
        Ok(raw) => parse_state(&raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
        Err(err) => Err(err.into()),
    }
}

fn parse_state(raw: &str) -> Result<StoreState, CredentialError> {
    let mut extra: Map<String, Value> = serde_json::from_str(raw)?;
    let credential = match extra.remove(TOKEN_KEY) {
        Some(Value::String(token)) => Credential::new(token),
        _ => None,
    };
    Ok(StoreState { credential, extra })
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Credential> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match read_state(&self.path) {
            Ok(fresh) => *state = fresh,
            Err(err) => tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "Failed to re-read credentials; using last known token"
            ),
        }
        state.credential.clone()
    }

    fn store(&self, credential: Credential) -> Result<(), CredentialError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let next = StoreState {
            credential: Some(credential),
            extra: state.extra.clone(),
        };
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let next = StoreState {
            credential: None,
            extra: state.extra.clone(),
        };
        self.persist(&next)?;
        *state = next;
        Ok(())
    }
}
