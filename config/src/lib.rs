//! Configuration loading for Courier.
//!
//! Raw TOML structs keep every field optional; [`CourierConfig::resolve`]
//! turns them into validated [`OrchestratorSettings`] plus [`AuthSettings`]
//! at the parse boundary.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use courier_types::settings::DEFAULT_REFRESH_PATH;
use courier_types::settings::{DEFAULT_BASE_URL, SettingsError};
use courier_types::{DedupeScope, OrchestratorSettings, RetrySettings};

const CREDENTIAL_FILE_NAME: &str = "credentials.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(#[from] SettingsError),
    #[error("unknown dedupe scope {0:?} (expected \"all\" or \"reads\")")]
    UnknownDedupeScope(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct CourierConfig {
    pub http: Option<HttpConfig>,
    pub cache: Option<CacheConfig>,
    pub retry: Option<RetryConfig>,
    pub auth: Option<AuthConfig>,
    pub notify: Option<NotifyConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpConfig {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub parallelism: Option<usize>,
    /// `"all"` (default) or `"reads"`.
    pub dedupe: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    pub refresh_path: Option<String>,
    pub credential_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotifyConfig {
    pub window_ms: Option<u64>,
}

/// Where credentials live and how they are renewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    refresh_path: String,
    credential_file: Option<PathBuf>,
}

impl AuthSettings {
    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// `None` when no home directory can be determined and none was configured.
    #[must_use]
    pub fn credential_file(&self) -> Option<&Path> {
        self.credential_file.as_deref()
    }
}

/// Fully validated configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub orchestrator: OrchestratorSettings,
    pub auth: AuthSettings,
}

impl CourierConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    /// Load from an explicit path. A missing file is `Ok(None)`.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Validate and apply defaults. String values go through `${VAR}` expansion.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let http = self.http.as_ref();
        let base_url = http
            .and_then(|h| h.base_url.as_deref())
            .map_or_else(|| DEFAULT_BASE_URL.to_string(), expand_env_vars);

        let mut settings = OrchestratorSettings::new(&base_url)?;
        if let Some(parallelism) = http.and_then(|h| h.parallelism) {
            settings = settings.with_parallelism(parallelism)?;
        }
        if let Some(ms) = http.and_then(|h| h.timeout_ms) {
            settings = settings.with_timeout(Duration::from_millis(ms));
        }
        if let Some(raw) = http.and_then(|h| h.dedupe.as_deref()) {
            let scope = DedupeScope::parse(raw)
                .ok_or_else(|| ConfigError::UnknownDedupeScope(raw.to_string()))?;
            settings = settings.with_dedupe(scope);
        }
        if let Some(secs) = self.cache.as_ref().and_then(|c| c.ttl_secs) {
            settings = settings.with_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(retry) = &self.retry {
            let defaults = RetrySettings::default();
            settings = settings.with_retry(RetrySettings::new(
                retry.max_retries.unwrap_or(defaults.max_retries()),
                retry
                    .delay_ms
                    .map_or(defaults.delay(), Duration::from_millis),
            ));
        }
        if let Some(ms) = self.notify.as_ref().and_then(|n| n.window_ms) {
            settings = settings.with_notify_window(Duration::from_millis(ms));
        }

        let auth = self.auth.as_ref();
        let refresh_path = auth
            .and_then(|a| a.refresh_path.as_deref())
            .map_or_else(|| DEFAULT_REFRESH_PATH.to_string(), expand_env_vars);
        let credential_file = auth
            .and_then(|a| a.credential_file.as_deref())
            .map(|raw| expand_home(&expand_env_vars(raw)))
            .or_else(default_credential_path);

        Ok(ResolvedConfig {
            orchestrator: settings,
            auth: AuthSettings {
                refresh_path,
                credential_file,
            },
        })
    }
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unclosed: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

#[must_use]
pub fn courier_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".courier"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    courier_dir().map(|dir| dir.join("config.toml"))
}

#[must_use]
pub fn default_credential_path() -> Option<PathBuf> {
    courier_dir().map(|dir| dir.join(CREDENTIAL_FILE_NAME))
}
