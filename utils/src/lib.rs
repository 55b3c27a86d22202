//! Shared infrastructure utilities for Courier.
//!
//! Filesystem helpers that don't belong in the domain-pure `courier-types`
//! crate:
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`credential_file`**: Bearer credential persisted as a JSON file

pub mod atomic_write;
pub mod credential_file;

pub use atomic_write::{AtomicWriteOptions, PersistMode, SyncPolicy, atomic_write};
pub use credential_file::FileCredentialStore;
