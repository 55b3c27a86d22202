//! The request orchestrator.
//!
//! Control flow for one call:
//!
//! ```text
//! caller ─▶ fingerprint ─▶ cache (GET) ─▶ in-flight registry ─▶ dispatch queue
//!        ─▶ transport ─▶ (401) auth refresh ─▶ replay ─▶ cache write (GET)
//! ```
//!
//! Each call that reaches the network runs on its own task, raced against its
//! cancellation token. Every collapsed caller observes the same settlement.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use courier_transport::{HttpTokenRefresher, TokenRefresher, TransportAdapter, resolve_url};
use courier_types::settings::DEFAULT_REFRESH_PATH;
use courier_types::{
    CredentialStore, ErrorKind, Fingerprint, MemoryCredentialStore, Method, OrchestratorSettings,
    RequestDescriptor, RequestError,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::auth::AuthRefreshCoordinator;
use crate::cache::ResponseCache;
use crate::cancel::CancellationRegistry;
use crate::inflight::{InFlightRegistry, Settlement};
use crate::notify::{Notifier, ThrottledNotifier, TracingNotifier};
use crate::queue::DispatchQueue;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("invalid refresh endpoint: {0}")]
    RefreshEndpoint(RequestError),
}

/// Point-in-time counters for diagnostics and loading indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrchestratorStats {
    /// Calls holding a dispatch slot.
    pub active: usize,
    /// Calls waiting for a dispatch slot.
    pub queued: usize,
    /// Distinct fingerprints with a shared call in progress.
    pub in_flight: usize,
    /// Live cache entries.
    pub cached: usize,
    /// Calls that can still be cancelled.
    pub cancellable: usize,
    /// Credential refreshes started.
    pub refreshes: u64,
    /// True while any call is executing.
    pub loading: bool,
}

/// Builder for [`RequestOrchestrator`].
#[must_use]
pub struct OrchestratorBuilder {
    settings: OrchestratorSettings,
    client: Option<reqwest::Client>,
    credentials: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    notifier: Option<Arc<dyn Notifier>>,
    refresh_path: String,
}

impl OrchestratorBuilder {
    pub fn new(settings: OrchestratorSettings) -> Self {
        Self {
            settings,
            client: None,
            credentials: None,
            refresher: None,
            notifier: None,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }

    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Path of the refresh endpoint used when no refresher is supplied.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn build(self) -> Result<RequestOrchestrator, BuildError> {
        let settings = self.settings;
        let client = match self.client {
            Some(client) => client,
            None => courier_transport::http_client()?,
        };
        let refresher = match self.refresher {
            Some(refresher) => refresher,
            None => {
                let url = resolve_url(settings.base_url(), &self.refresh_path)
                    .map_err(BuildError::RefreshEndpoint)?;
                Arc::new(HttpTokenRefresher::new(
                    client.clone(),
                    url,
                    settings.timeout(),
                ))
            }
        };
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::default()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));

        let transport = TransportAdapter::new(
            client,
            settings.base_url().clone(),
            settings.timeout(),
            settings.retry(),
        );

        Ok(RequestOrchestrator {
            inner: Arc::new(Inner {
                cache: ResponseCache::new(settings.cache_ttl()),
                inflight: InFlightRegistry::new(),
                queue: DispatchQueue::new(settings.parallelism()),
                cancels: CancellationRegistry::new(),
                auth: AuthRefreshCoordinator::new(refresher, credentials),
                notifier: ThrottledNotifier::new(notifier, settings.notify_window()),
                loading: AtomicUsize::new(0),
                disposed: AtomicBool::new(false),
                transport,
                settings,
            }),
        })
    }
}

/// Deduplicating, caching, bounded, cancellable HTTP client.
///
/// Cheap to clone; clones share all state. Instances are independent of
/// each other.
#[derive(Debug, Clone)]
pub struct RequestOrchestrator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    settings: OrchestratorSettings,
    transport: TransportAdapter,
    cache: ResponseCache,
    inflight: InFlightRegistry,
    queue: DispatchQueue,
    cancels: CancellationRegistry,
    auth: AuthRefreshCoordinator,
    notifier: ThrottledNotifier,
    loading: AtomicUsize,
    disposed: AtomicBool,
}

impl RequestOrchestrator {
    pub fn builder(settings: OrchestratorSettings) -> OrchestratorBuilder {
        OrchestratorBuilder::new(settings)
    }

    /// Orchestrator with default collaborators: in-memory credentials,
    /// HTTP refresh at the default path, notifications to `tracing`.
    pub fn new(settings: OrchestratorSettings) -> Result<Self, BuildError> {
        OrchestratorBuilder::new(settings).build()
    }

    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Option<Value>,
    ) -> Result<T, RequestError> {
        let descriptor =
            RequestDescriptor::new(Method::Get, url)?.with_params(params.unwrap_or(Value::Null))?;
        self.request(descriptor).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        body: Option<Value>,
    ) -> Result<T, RequestError> {
        let descriptor =
            RequestDescriptor::new(Method::Post, url)?.with_body(body.unwrap_or(Value::Null))?;
        self.request(descriptor).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        url: &str,
        body: Option<Value>,
    ) -> Result<T, RequestError> {
        let descriptor =
            RequestDescriptor::new(Method::Put, url)?.with_body(body.unwrap_or(Value::Null))?;
        self.request(descriptor).await
    }

    pub async fn del<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Option<Value>,
    ) -> Result<T, RequestError> {
        let descriptor = RequestDescriptor::new(Method::Delete, url)?
            .with_params(params.unwrap_or(Value::Null))?;
        self.request(descriptor).await
    }

    /// Run `descriptor` and decode the payload into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, RequestError> {
        let value = self.request_value(descriptor).await?;
        serde_json::from_value(value).map_err(|e| RequestError::decode(e.to_string()))
    }

    /// Run `descriptor` and return the raw JSON payload.
    pub async fn request_value(&self, descriptor: RequestDescriptor) -> Settlement {
        if self.is_disposed() {
            return Err(RequestError::cancelled().with_detail("orchestrator disposed"));
        }

        let fingerprint = Fingerprint::of(&descriptor);
        let method = descriptor.method();
        if method.is_read()
            && let Some(payload) = self.inner.cache.get(&fingerprint)
        {
            tracing::debug!(url = descriptor.url(), "Cache hit");
            return Ok(payload);
        }

        let inner = Arc::clone(&self.inner);
        let settlement = if self.inner.settings.dedupe().applies_to(method) {
            let key = fingerprint.clone();
            let (shared, _) = self.inner.inflight.dedupe(fingerprint, move |call_id| {
                Inner::start_call(inner, call_id, key, descriptor)
            });
            shared
        } else {
            let (shared, _) = self.inner.inflight.run_untracked(move |call_id| {
                Inner::start_call(inner, call_id, fingerprint, descriptor)
            });
            shared
        };
        settlement.await
    }

    /// Abort every call that has not settled yet.
    ///
    /// Each aborted call releases its dispatch slot, leaves the in-flight
    /// registry, and rejects all its subscribers with `Cancelled`. Returns the
    /// number of calls aborted.
    pub fn cancel_all_requests(&self) -> usize {
        // Unlink before any token fires; later callers must start fresh.
        let inflight = &self.inner.inflight;
        let cancelled = self.inner.cancels.cancel_all(|call_id, fingerprint| {
            inflight.remove_if(fingerprint, call_id);
        });
        if !cancelled.is_empty() {
            tracing::info!(count = cancelled.len(), "Cancelled all pending requests");
        }
        cancelled.len()
    }

    /// Drop the cached payload for `descriptor`, if any.
    pub fn invalidate(&self, descriptor: &RequestDescriptor) -> bool {
        self.inner.cache.invalidate(&Fingerprint::of(descriptor))
    }

    /// Drop every cached payload for `url`, whatever its parameters.
    pub fn invalidate_url(&self, url: &str) -> usize {
        self.inner.cache.invalidate_url(url)
    }

    pub fn invalidate_all(&self) -> usize {
        self.inner.cache.invalidate_all()
    }

    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        let inner = &self.inner;
        OrchestratorStats {
            active: inner.queue.active(),
            queued: inner.queue.queued(),
            in_flight: inner.inflight.len(),
            cached: inner.cache.len(),
            cancellable: inner.cancels.len(),
            refreshes: inner.auth.refreshes(),
            loading: inner.loading.load(Ordering::SeqCst) > 0,
        }
    }

    /// Notifications dropped by the throttle so far.
    #[must_use]
    pub fn suppressed_notifications(&self) -> u64 {
        self.inner.notifier.suppressed()
    }

    /// Cancel everything, reject future calls, and drop the cache.
    ///
    /// Idempotent. Clones of this orchestrator are disposed too.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel_all_requests();
        self.inner.queue.close();
        self.inner.inflight.clear();
        self.inner.cache.invalidate_all();
        tracing::info!("Request orchestrator disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl Inner {
    /// Register the call for cancellation and build its task body.
    fn start_call(
        inner: Arc<Self>,
        call_id: u64,
        fingerprint: Fingerprint,
        descriptor: RequestDescriptor,
    ) -> impl Future<Output = Settlement> + Send + 'static {
        let token = inner.cancels.register(call_id, fingerprint.clone());
        async move {
            let settlement = tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(url = descriptor.url(), "Request cancelled");
                    Err(RequestError::cancelled())
                }
                settlement = inner.execute(&fingerprint, &descriptor) => settlement,
            };
            inner.cancels.release(call_id);
            if let Err(err) = &settlement {
                inner.notifier.report(err);
            }
            settlement
        }
    }

    async fn execute(&self, fingerprint: &Fingerprint, descriptor: &RequestDescriptor) -> Settlement {
        let _slot = self
            .queue
            .admit()
            .await
            .map_err(|_| RequestError::cancelled().with_detail("dispatch queue closed"))?;
        let _loading = LoadingGuard::enter(&self.loading);

        let mut credential = self.auth.credential();
        let mut recovered = false;
        let payload = loop {
            match self.transport.execute(descriptor, credential.as_ref()).await {
                Err(err) if err.kind() == ErrorKind::Unauthorized && !recovered => {
                    recovered = true;
                    credential = Some(self.auth.recover(credential).await?);
                    tracing::debug!(url = descriptor.url(), "Replaying with refreshed credential");
                }
                other => break other?,
            }
        };

        if descriptor.method().is_read() {
            self.cache
                .put(fingerprint.clone(), descriptor.url(), payload.clone());
        }
        Ok(payload)
    }
}

/// Tracks the number of executing calls; logs when loading starts and stops.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::debug!(loading = true, "Loading state changed");
        }
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.0.fetch_sub(1, Ordering::SeqCst) == 1 {
            tracing::debug!(loading = false, "Loading state changed");
        }
    }
}
