//! In-memory TTL cache for successful GET payloads.
//!
//! - Keyed by [`Fingerprint`]; the URL is kept for per-URL invalidation
//! - Expired entries read as absent and are dropped on the read that finds them
//! - No background sweeping and no size bound

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use courier_types::Fingerprint;
use serde_json::Value;

#[derive(Debug, Clone)]
struct CacheEntry {
    url: String,
    payload: Value,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Payload stored for `fingerprint`, if younger than the TTL.
    #[must_use]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Value> {
        let mut entries = self.lock();
        match entries.get(fingerprint) {
            Some(entry) if !entry.is_expired(self.ttl) => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(fingerprint);
                tracing::debug!(fingerprint = %fingerprint, "Cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Store `payload`, replacing any previous entry and restarting its TTL.
    pub fn put(&self, fingerprint: Fingerprint, url: &str, payload: Value) {
        self.lock().insert(
            fingerprint,
            CacheEntry {
                url: url.to_string(),
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    /// Returns true if an entry was removed.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().remove(fingerprint).is_some()
    }

    /// Drop every entry recorded for `url`, whatever its parameters.
    pub fn invalidate_url(&self, url: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.url != url);
        before - entries.len()
    }

    pub fn invalidate_all(&self) -> usize {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| !entry.is_expired(self.ttl))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
