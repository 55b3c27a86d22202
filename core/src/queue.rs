//! Bounded-concurrency FIFO admission to the transport.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admits at most `parallelism` calls at a time, in arrival order.
///
/// Backed by tokio's fair semaphore, so waiters are served FIFO. A slot is
/// returned when its [`QueueSlot`] drops: on completion, failure, or when the
/// owning future is dropped by cancellation.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    semaphore: Arc<Semaphore>,
    parallelism: NonZeroUsize,
    active: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

/// Proof of admission. Holding it occupies one slot.
#[derive(Debug)]
pub struct QueueSlot {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counts a waiter as queued until it is admitted or gives up.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The queue was closed by dispose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("dispatch queue is closed")]
pub struct QueueClosed;

impl DispatchQueue {
    #[must_use]
    pub fn new(parallelism: NonZeroUsize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(parallelism.get())),
            parallelism,
            active: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot.
    pub async fn admit(&self) -> Result<QueueSlot, QueueClosed> {
        self.queued.fetch_add(1, Ordering::SeqCst);
        let waiting = QueuedGuard(&self.queued);
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| QueueClosed)?;
        drop(waiting);

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(active, queued = self.queued(), "Admitted to dispatch queue");
        Ok(QueueSlot {
            _permit: permit,
            active: Arc::clone(&self.active),
        })
    }

    /// Reject every current and future waiter. Admitted slots run to completion.
    pub fn close(&self) {
        self.semaphore.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    #[must_use]
    pub fn parallelism(&self) -> NonZeroUsize {
        self.parallelism
    }

    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}
