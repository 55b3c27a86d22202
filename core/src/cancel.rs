//! Cooperative cancellation for in-flight calls.
//!
//! One [`CancelHandle`]/[`CancelToken`] pair per transport call, built on a
//! `watch` channel so cancellation is level-triggered: a token that starts
//! waiting after `cancel` still observes it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use courier_types::Fingerprint;
use tokio::sync::watch;

#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled. A dropped handle also counts as cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

#[derive(Debug)]
struct Tracked {
    fingerprint: Fingerprint,
    handle: CancelHandle,
}

/// Cancellation handles for every outstanding transport call, by call id.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    handles: Mutex<HashMap<u64, Tracked>>,
}

impl CancellationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Tracked>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a new call and return the token its task should watch.
    pub fn register(&self, call_id: u64, fingerprint: Fingerprint) -> CancelToken {
        let (handle, token) = cancel_pair();
        self.lock().insert(
            call_id,
            Tracked {
                fingerprint,
                handle,
            },
        );
        token
    }

    /// Forget a settled call without cancelling it.
    pub fn release(&self, call_id: u64) -> bool {
        self.lock().remove(&call_id).is_some()
    }

    /// Cancel and forget every tracked call.
    ///
    /// `detach` sees every drained call before any token fires, so callers
    /// can unlink the calls from shared state while their tasks still run.
    /// Returns the `(call_id, fingerprint)` of each cancelled call.
    pub fn cancel_all(
        &self,
        mut detach: impl FnMut(u64, &Fingerprint),
    ) -> Vec<(u64, Fingerprint)> {
        let drained: Vec<_> = self.lock().drain().collect();
        for (call_id, tracked) in &drained {
            detach(*call_id, &tracked.fingerprint);
        }
        drained
            .into_iter()
            .map(|(call_id, tracked)| {
                tracked.handle.cancel();
                (call_id, tracked.fingerprint)
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
