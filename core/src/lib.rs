//! Client-side HTTP request orchestration for Courier.
//!
//! [`RequestOrchestrator`] puts a response cache, single-flight collapsing,
//! a bounded FIFO dispatch queue, single-flight credential refresh, bulk
//! cancellation and throttled failure notifications in front of
//! [`courier_transport::TransportAdapter`].

pub mod auth;
pub mod cache;
pub mod cancel;
pub mod inflight;
pub mod notify;
mod orchestrator;
pub mod queue;
pub mod services;

pub use auth::{AuthRefreshCoordinator, AuthState, AuthTransition, RefreshOutcome};
pub use cache::ResponseCache;
pub use cancel::{CancelHandle, CancelToken, CancellationRegistry, cancel_pair};
pub use inflight::{Attachment, InFlightRegistry, Settlement, SharedSettlement};
pub use notify::{Notifier, NotifyThrottle, ThrottledNotifier, TracingNotifier};
pub use orchestrator::{BuildError, OrchestratorBuilder, OrchestratorStats, RequestOrchestrator};
pub use queue::{DispatchQueue, QueueClosed, QueueSlot};
pub use services::{
    ApiEnvelope, Profile, ProfileService, ProfileUpdate, User, UserDraft, UserService,
};

pub use courier_transport::{HttpTokenRefresher, StaticTokenRefresher, TokenRefresher};
pub use courier_types;
