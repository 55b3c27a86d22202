//! Resolved orchestrator settings shared across crates.
//!
//! Raw TOML structs (all `Option`) stay private in `courier-config`; the
//! loader resolves them into these types at the parse boundary. Existence of
//! a value is the proof of its validity.

use std::num::NonZeroUsize;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_PARALLELISM: NonZeroUsize = NonZeroUsize::new(3).unwrap();
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_NOTIFY_WINDOW: Duration = Duration::from_secs(2);
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("base url {url:?} is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("base url {0:?} must use http or https")]
    UnsupportedScheme(String),
    #[error("parallelism must be at least 1")]
    ZeroParallelism,
}

/// Which verbs collapse onto a shared in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupeScope {
    /// Every verb, including writes with identical bodies.
    #[default]
    AllVerbs,
    /// Only GET requests collapse; writes always hit the network.
    ReadsOnly,
}

impl DedupeScope {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "all_verbs" | "all-verbs" => Some(Self::AllVerbs),
            "reads" | "reads_only" | "reads-only" | "get" => Some(Self::ReadsOnly),
            _ => None,
        }
    }

    #[must_use]
    pub fn applies_to(self, method: crate::Method) -> bool {
        match self {
            Self::AllVerbs => true,
            Self::ReadsOnly => method.is_read(),
        }
    }
}

/// Transport retry policy: `max_retries` further attempts after the first,
/// waiting `delay * n` before retry `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    max_retries: u32,
    delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetrySettings {
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.delay.saturating_mul(retry)
    }
}

/// Everything the orchestrator needs to run.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    base_url: Url,
    parallelism: NonZeroUsize,
    cache_ttl: Duration,
    timeout: Duration,
    retry: RetrySettings,
    notify_window: Duration,
    dedupe: DedupeScope,
}

impl OrchestratorSettings {
    pub fn new(base_url: &str) -> Result<Self, SettingsError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            parallelism: DEFAULT_PARALLELISM,
            cache_ttl: DEFAULT_CACHE_TTL,
            timeout: DEFAULT_TIMEOUT,
            retry: RetrySettings::default(),
            notify_window: DEFAULT_NOTIFY_WINDOW,
            dedupe: DedupeScope::default(),
        })
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Result<Self, SettingsError> {
        self.parallelism = NonZeroUsize::new(parallelism).ok_or(SettingsError::ZeroParallelism)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_notify_window(mut self, window: Duration) -> Self {
        self.notify_window = window;
        self
    }

    #[must_use]
    pub fn with_dedupe(mut self, dedupe: DedupeScope) -> Self {
        self.dedupe = dedupe;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn parallelism(&self) -> NonZeroUsize {
        self.parallelism
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn retry(&self) -> RetrySettings {
        self.retry
    }

    #[must_use]
    pub fn notify_window(&self) -> Duration {
        self.notify_window
    }

    #[must_use]
    pub fn dedupe(&self) -> DedupeScope {
        self.dedupe
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL)
                .unwrap_or_else(|_| unreachable!("default base url is a valid literal")),
            parallelism: DEFAULT_PARALLELISM,
            cache_ttl: DEFAULT_CACHE_TTL,
            timeout: DEFAULT_TIMEOUT,
            retry: RetrySettings::default(),
            notify_window: DEFAULT_NOTIFY_WINDOW,
            dedupe: DedupeScope::default(),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, SettingsError> {
    let url = Url::parse(raw.trim()).map_err(|err| SettingsError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SettingsError::UnsupportedScheme(raw.to_string()));
    }
    Ok(url)
}
