//! Single-flight credential recovery after a 401.
//!
//! [`AuthState`] is the pure state machine; [`AuthRefreshCoordinator`] drives
//! it with a [`TokenRefresher`] and a [`CredentialStore`].
//!
//! ```text
//!            on_unauthorized            on_settled(outcome)
//!   Idle ─────────────────────▶ Refreshing ─────────────────▶ Idle
//!                               │  ▲                          (waiters drained)
//!              on_unauthorized  │  │
//!              (enqueue waiter) └──┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courier_transport::TokenRefresher;
use courier_types::{Credential, CredentialStore, RequestError};
use tokio::sync::oneshot;

/// What every party blocked on one refresh receives.
pub type RefreshOutcome = Result<Credential, RequestError>;

#[derive(Debug, Default)]
pub enum AuthState {
    #[default]
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

/// What a request that just saw a 401 should do next.
#[derive(Debug)]
pub enum AuthTransition {
    /// No refresh was running: this caller performs it.
    StartRefresh,
    /// A refresh is running: wait for its outcome.
    Wait(oneshot::Receiver<RefreshOutcome>),
}

impl AuthState {
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(self, Self::Refreshing { .. })
    }

    #[must_use]
    pub fn waiters(&self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Refreshing { waiters } => waiters.len(),
        }
    }

    pub fn on_unauthorized(&mut self) -> AuthTransition {
        match self {
            Self::Idle => {
                *self = Self::Refreshing {
                    waiters: Vec::new(),
                };
                AuthTransition::StartRefresh
            }
            Self::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                AuthTransition::Wait(rx)
            }
        }
    }

    /// Return to `Idle`, handing `outcome` to every waiter exactly once.
    ///
    /// Returns the number of waiters drained.
    pub fn on_settled(&mut self, outcome: &RefreshOutcome) -> usize {
        match std::mem::take(self) {
            Self::Idle => 0,
            Self::Refreshing { waiters } => {
                let drained = waiters.len();
                for waiter in waiters {
                    // A waiter whose request was cancelled has gone away.
                    let _ = waiter.send(outcome.clone());
                }
                drained
            }
        }
    }
}

pub struct AuthRefreshCoordinator {
    state: Mutex<AuthState>,
    refresher: Arc<dyn TokenRefresher>,
    store: Arc<dyn CredentialStore>,
    refreshes: AtomicU64,
}

impl std::fmt::Debug for AuthRefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRefreshCoordinator")
            .field("state", &*self.lock())
            .field("refreshes", &self.refreshes())
            .finish_non_exhaustive()
    }
}

impl AuthRefreshCoordinator {
    #[must_use]
    pub fn new(refresher: Arc<dyn TokenRefresher>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            state: Mutex::new(AuthState::Idle),
            refresher,
            store,
            refreshes: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.store.load()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock().is_refreshing()
    }

    /// Refreshes started since construction.
    #[must_use]
    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Obtain a fresh credential after `expired` was rejected.
    ///
    /// Concurrent callers share one refresh. On success the new credential
    /// is already in the store when this returns.
    pub async fn recover(&self, expired: Option<Credential>) -> RefreshOutcome {
        let transition = self.lock().on_unauthorized();
        match transition {
            AuthTransition::Wait(rx) => {
                tracing::debug!("Waiting on in-progress credential refresh");
                rx.await
                    .unwrap_or_else(|_| Err(RequestError::refresh_failed("refresh abandoned")))
            }
            AuthTransition::StartRefresh => {
                let guard = RefreshGuard {
                    coordinator: self,
                    settled: false,
                };
                self.refreshes.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Refreshing credential");

                let outcome = match self.refresher.refresh(expired.as_ref()).await {
                    Ok(credential) => match self.store.store(credential.clone()) {
                        Ok(()) => Ok(credential),
                        Err(e) => Err(RequestError::refresh_failed(format!(
                            "failed to store refreshed credential: {e}"
                        ))),
                    },
                    Err(err) => Err(err),
                };
                guard.settle(&outcome);
                outcome
            }
        }
    }
}

/// Settles the state machine even if the refreshing future is dropped.
struct RefreshGuard<'a> {
    coordinator: &'a AuthRefreshCoordinator,
    settled: bool,
}

impl RefreshGuard<'_> {
    fn settle(mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        let drained = self.coordinator.lock().on_settled(outcome);
        match outcome {
            Ok(_) => tracing::info!(waiters = drained, "Credential refreshed"),
            Err(err) => tracing::info!(
                waiters = drained,
                error = err.detail().unwrap_or(err.message()),
                "Credential refresh failed"
            ),
        }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = Err(RequestError::refresh_failed("refresh abandoned"));
            let drained = self.coordinator.lock().on_settled(&abandoned);
            tracing::info!(waiters = drained, "Credential refresh abandoned");
        }
    }
}
