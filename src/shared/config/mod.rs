//! Sync configuration module
//!
//! Provides the configuration shared by the page context and the background
//! cache worker. Values are layered: built-in defaults, then an optional TOML
//! file, then `BALLOONPOP_*` environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default connectivity probe target
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/favicon.ico";

/// Durable storage key owned by the pending-deletion queue
pub const DEFAULT_QUEUE_KEY: &str = "pendingFirebaseDeletions";

/// Background sync tag that asks clients to drain their queue
pub const DEFAULT_SYNC_TAG: &str = "sync-pending-deletions";

/// Prefix of the versioned static cache generation
pub const STATIC_CACHE_PREFIX: &str = "balloon-pop-static";

const DEFAULT_CACHE_VERSION: &str = "v1";
const DEFAULT_DYNAMIC_CACHE: &str = "balloon-pop-dynamic";
const DEFAULT_APP_SCOPE: &str = "http://localhost:8080/";
const DEFAULT_STORAGE_API: &str = "https://firebasestorage.googleapis.com";
const DEFAULT_REMOTE_ORIGINS: [&str; 4] = [
    "firebasestorage.googleapis.com",
    "firestore.googleapis.com",
    "www.googleapis.com",
    "identitytoolkit.googleapis.com",
];

/// Configuration for the offline caching and sync layer
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Highly-available resource fetched by the connectivity probe
    pub probe_url: String,
    /// Deadline for a single probe round-trip
    pub probe_timeout: Duration,
    /// Re-probe interval while offline
    pub probe_interval: Duration,
    /// Attempt ceiling for a pending deletion
    pub max_attempts: u32,
    /// Key under which the pending queue is persisted
    pub queue_storage_key: String,
    /// Directory backing the durable key-value store
    pub storage_dir: PathBuf,
    /// Version token of the static cache generation
    pub cache_version: String,
    /// Name of the runtime-populated cache generation
    pub dynamic_cache_name: String,
    /// Hosts served network-first by the cache worker
    pub remote_origins: Vec<String>,
    /// Object store bucket used by the live deletion backend
    pub storage_bucket: Option<String>,
    /// Base URL of the object store REST API
    pub storage_api_base: String,
    /// Background sync tag
    pub sync_tag: String,
    /// Origin and base path the cache worker controls
    pub app_scope: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: Duration::from_secs(5),
            probe_interval: Duration::from_secs(5),
            max_attempts: 5,
            queue_storage_key: DEFAULT_QUEUE_KEY.to_string(),
            storage_dir: default_storage_dir(),
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            dynamic_cache_name: DEFAULT_DYNAMIC_CACHE.to_string(),
            remote_origins: DEFAULT_REMOTE_ORIGINS.iter().map(|s| s.to_string()).collect(),
            storage_bucket: None,
            storage_api_base: DEFAULT_STORAGE_API.to_string(),
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
            app_scope: DEFAULT_APP_SCOPE.to_string(),
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Name of the current static cache generation
    pub fn static_cache_name(&self) -> String {
        format!("{}-{}", STATIC_CACHE_PREFIX, self.cache_version)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.probe_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.probe_url, e)))?;
        url::Url::parse(&self.storage_api_base)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.storage_api_base, e)))?;
        url::Url::parse(&self.app_scope)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.app_scope, e)))?;
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.probe_timeout.is_zero() || self.probe_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "probe_timeout",
                message: "probe durations must be non-zero".to_string(),
            });
        }
        if self.queue_storage_key.is_empty() {
            return Err(ConfigError::MissingValue("queue_storage_key"));
        }
        if self.cache_version.is_empty() {
            return Err(ConfigError::MissingValue("cache_version"));
        }
        Ok(())
    }

    /// Defaults overridden by `BALLOONPOP_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document layered over the defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        file.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file layered over the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Load defaults, then an optional TOML file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = std::env::var("BALLOONPOP_PROBE_URL") {
            self.probe_url = url;
        }
        if let Ok(dir) = std::env::var("BALLOONPOP_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Ok(version) = std::env::var("BALLOONPOP_CACHE_VERSION") {
            self.cache_version = version;
        }
        if let Ok(scope) = std::env::var("BALLOONPOP_APP_SCOPE") {
            self.app_scope = scope;
        }
        if let Ok(bucket) = std::env::var("BALLOONPOP_STORAGE_BUCKET") {
            self.storage_bucket = Some(bucket);
        }
        if let Ok(raw) = std::env::var("BALLOONPOP_MAX_ATTEMPTS") {
            self.max_attempts = raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: "max_attempts",
                message: format!("not a number: {}", raw),
            })?;
        }
        Ok(())
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the connectivity probe URL
    pub fn probe_url(mut self, url: impl Into<String>) -> Self {
        self.config.probe_url = url.into();
        self
    }

    /// Set the probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the offline re-probe interval
    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe_interval = interval;
        self
    }

    /// Set the pending deletion attempt ceiling
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the durable storage directory
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    /// Set the static cache version token
    pub fn cache_version(mut self, version: impl Into<String>) -> Self {
        self.config.cache_version = version.into();
        self
    }

    /// Set the object store bucket
    pub fn storage_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.storage_bucket = Some(bucket.into());
        self
    }

    /// Set the object store API base URL
    pub fn storage_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.storage_api_base = base.into();
        self
    }

    /// Set the origin and base path the cache worker controls
    pub fn app_scope(mut self, scope: impl Into<String>) -> Self {
        self.config.app_scope = scope.into();
        self
    }

    /// Replace the network-first remote origins
    pub fn remote_origins(mut self, origins: Vec<String>) -> Self {
        self.config.remote_origins = origins;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// On-disk TOML shape; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    probe_url: Option<String>,
    probe_timeout_secs: Option<u64>,
    probe_interval_secs: Option<u64>,
    max_attempts: Option<u32>,
    queue_storage_key: Option<String>,
    storage_dir: Option<PathBuf>,
    cache_version: Option<String>,
    dynamic_cache_name: Option<String>,
    remote_origins: Option<Vec<String>>,
    storage_bucket: Option<String>,
    storage_api_base: Option<String>,
    sync_tag: Option<String>,
    app_scope: Option<String>,
}

impl FileConfig {
    fn apply(self, config: &mut SyncConfig) {
        if let Some(v) = self.probe_url {
            config.probe_url = v;
        }
        if let Some(v) = self.probe_timeout_secs {
            config.probe_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.probe_interval_secs {
            config.probe_interval = Duration::from_secs(v);
        }
        if let Some(v) = self.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = self.queue_storage_key {
            config.queue_storage_key = v;
        }
        if let Some(v) = self.storage_dir {
            config.storage_dir = v;
        }
        if let Some(v) = self.cache_version {
            config.cache_version = v;
        }
        if let Some(v) = self.dynamic_cache_name {
            config.dynamic_cache_name = v;
        }
        if let Some(v) = self.remote_origins {
            config.remote_origins = v;
        }
        if self.storage_bucket.is_some() {
            config.storage_bucket = self.storage_bucket;
        }
        if let Some(v) = self.storage_api_base {
            config.storage_api_base = v;
        }
        if let Some(v) = self.sync_tag {
            config.sync_tag = v;
        }
        if let Some(v) = self.app_scope {
            config.app_scope = v;
        }
    }
}

fn default_storage_dir() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    path.push("balloonpop");
    path
}

/// Configuration errors
#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("config read error: {0}")]
    Io(String),
}
