//! User-facing failure notifications, throttled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use courier_types::RequestError;

/// Where user-facing messages go (toast, status line, stderr, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Emits notifications as `warn` events on the `courier::notify` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(target: "courier::notify", "{message}");
    }
}

/// Admits a message only if more than `window` has passed since the last
/// admitted one. Suppressed messages do not extend the window.
#[derive(Debug)]
pub struct NotifyThrottle {
    window: Duration,
    last_shown: Mutex<Option<Instant>>,
}

impl NotifyThrottle {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_shown: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> bool {
        let mut last = self.last_shown.lock().unwrap_or_else(PoisonError::into_inner);
        let open = last.is_none_or(|shown| now.saturating_duration_since(shown) > self.window);
        if open {
            *last = Some(now);
        }
        open
    }
}

/// Routes classified failures to a [`Notifier`] through a [`NotifyThrottle`].
pub struct ThrottledNotifier {
    notifier: Arc<dyn Notifier>,
    throttle: NotifyThrottle,
    suppressed: AtomicU64,
}

impl std::fmt::Debug for ThrottledNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledNotifier")
            .field("throttle", &self.throttle)
            .field("suppressed", &self.suppressed())
            .finish_non_exhaustive()
    }
}

impl ThrottledNotifier {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, window: Duration) -> Self {
        Self {
            notifier,
            throttle: NotifyThrottle::new(window),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Surface `err` if its kind warrants a notification and the throttle
    /// is open. Returns true if the notifier was called.
    pub fn report(&self, err: &RequestError) -> bool {
        let Some(message) = err.notification() else {
            return false;
        };
        if self.throttle.admit() {
            self.notifier.notify(message);
            true
        } else {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(message, "Notification suppressed by throttle");
            false
        }
    }

    /// Notifications dropped by the throttle so far.
    #[must_use]
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}
