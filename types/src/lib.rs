//! Core domain types for Courier.
//!
//! Pure request-shaped values with no IO and no async: descriptors, their
//! fingerprints, classified errors, credentials, and resolved settings.
//! Everything here can be used from any layer of the application.

mod credential;
mod error;
mod fingerprint;
mod request;
pub mod settings;

pub use credential::{Credential, CredentialError, CredentialStore, MemoryCredentialStore};
pub use error::{ErrorKind, RequestError, status_message};
pub use fingerprint::{Fingerprint, canonical_json};
pub use request::{DescriptorError, Method, RequestDescriptor};
pub use settings::{DedupeScope, OrchestratorSettings, RetrySettings, SettingsError};
