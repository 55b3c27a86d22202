//! Single-flight collapsing of identical requests.
//!
//! The first caller for a fingerprint spawns the work; later callers join the
//! same [`SharedSettlement`] until it settles. The spawned task removes its own
//! entry *before* publishing the result, so a call made after settlement
//! always starts fresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courier_types::{Fingerprint, RequestError};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;

/// Result every subscriber of one call observes.
pub type Settlement = Result<Value, RequestError>;

/// Cloneable handle to an in-progress call.
pub type SharedSettlement = Shared<BoxFuture<'static, Settlement>>;

struct Entry {
    call_id: u64,
    settlement: SharedSettlement,
    subscribers: usize,
}

type EntryMap = HashMap<Fingerprint, Entry>;

/// How a caller was attached to a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// This caller started the call.
    Started { call_id: u64 },
    /// This caller joined a call already in flight.
    Joined { call_id: u64 },
}

impl Attachment {
    #[must_use]
    pub fn call_id(self) -> u64 {
        match self {
            Self::Started { call_id } | Self::Joined { call_id } => call_id,
        }
    }
}

#[derive(Clone, Default)]
pub struct InFlightRegistry {
    entries: Arc<Mutex<EntryMap>>,
    next_call_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &self.len())
            .finish_non_exhaustive()
    }
}

impl InFlightRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EntryMap> {
        lock_entries(&self.entries)
    }

    /// Join the call for `fingerprint`, or start one with `factory`.
    ///
    /// `factory` receives the new call id and runs on its own tokio task, so
    /// the call completes even if every subscriber stops polling.
    pub fn dedupe<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        factory: F,
    ) -> (SharedSettlement, Attachment)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Settlement> + Send + 'static,
    {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(&fingerprint) {
            entry.subscribers += 1;
            tracing::debug!(
                fingerprint = %fingerprint,
                subscribers = entry.subscribers,
                "Joined in-flight request"
            );
            return (
                entry.settlement.clone(),
                Attachment::Joined {
                    call_id: entry.call_id,
                },
            );
        }

        let call_id = self.allocate_call_id();
        let registry = Arc::clone(&self.entries);
        let key = fingerprint.clone();
        // The entry is inserted below while the lock is still held, so the
        // task's removal can never run ahead of the insert.
        let settlement = spawn_settlement(factory(call_id), move || {
            remove_entry(&registry, &key, call_id);
        });

        entries.insert(
            fingerprint,
            Entry {
                call_id,
                settlement: settlement.clone(),
                subscribers: 1,
            },
        );
        (settlement, Attachment::Started { call_id })
    }

    /// Run a call that never collapses with others (and is never joined).
    pub fn run_untracked<F, Fut>(&self, factory: F) -> (SharedSettlement, u64)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Settlement> + Send + 'static,
    {
        let call_id = self.allocate_call_id();
        (spawn_settlement(factory(call_id), || {}), call_id)
    }

    fn allocate_call_id(&self) -> u64 {
        self.next_call_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove the entry for `fingerprint` if it still belongs to `call_id`.
    pub fn remove_if(&self, fingerprint: &Fingerprint, call_id: u64) -> bool {
        remove_entry(&self.entries, fingerprint, call_id)
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Callers attached to the call for `fingerprint` (0 if none is in flight).
    #[must_use]
    pub fn subscribers(&self, fingerprint: &Fingerprint) -> usize {
        self.lock().get(fingerprint).map_or(0, |entry| entry.subscribers)
    }
}

/// Drive `work` on its own task; `on_settled` runs before the result is published.
fn spawn_settlement<Fut, Done>(work: Fut, on_settled: Done) -> SharedSettlement
where
    Fut: Future<Output = Settlement> + Send + 'static,
    Done: FnOnce() + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let settlement = work.await;
        on_settled();
        settlement
    });

    async move {
        handle.await.unwrap_or_else(|err| {
            Err(if err.is_panic() {
                RequestError::cancelled().with_detail("request task panicked")
            } else {
                RequestError::cancelled()
            })
        })
    }
    .boxed()
    .shared()
}

fn lock_entries(entries: &Mutex<EntryMap>) -> MutexGuard<'_, EntryMap> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove_entry(entries: &Mutex<EntryMap>, fingerprint: &Fingerprint, call_id: u64) -> bool {
    let mut entries = lock_entries(entries);
    // A newer call may already own the key after an explicit removal.
    if entries.get(fingerprint).is_some_and(|entry| entry.call_id == call_id) {
        entries.remove(fingerprint);
        true
    } else {
        false
    }
}
