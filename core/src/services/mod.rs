//! Typed endpoint wrappers over [`crate::RequestOrchestrator`].

mod envelope;
mod profile;
mod users;

pub use envelope::ApiEnvelope;
pub use profile::{Profile, ProfileService, ProfileUpdate};
pub use users::{Address, Company, Geo, User, UserDraft, UserService};
