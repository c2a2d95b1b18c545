//! Engine configuration
//!
//! Layered from built-in defaults, an optional YAML/TOML/JSON file and
//! `RPKI_`-prefixed environment variables (nested keys use `__`, e.g.
//! `RPKI_VALIDATION__MAX_STALE_DAYS=2`).

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "RPKI";

/// Object cache backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    /// SQLite database file, used by the `sqlite` backend
    pub sqlite_path: PathBuf,
    pub max_connections: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Sqlite,
            sqlite_path: PathBuf::from("rpki-cache.db"),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// rsync executable
    pub rsync_binary: String,
    /// Local directory rsync mirrors repositories into
    pub mirror_directory: PathBuf,
    pub rsync_timeout_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            rsync_binary: "rsync".to_string(),
            mirror_directory: PathBuf::from("rsync-mirror"),
            rsync_timeout_secs: 300,
            http_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Maximum age of manifests and CRLs past their next-update time
    pub max_stale_days: u32,
    pub loose_validation_enabled: bool,
    /// Prefer RRDP over rsync when a repository offers both
    pub prefer_rrdp: bool,
    /// Minutes between two scheduled runs of the same trust anchor
    pub interval_minutes: u64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_stale_days: 0,
            loose_validation_enabled: false,
            prefer_rrdp: true,
            interval_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Prometheus exporter bind address, disabled when unset
    pub listen_address: Option<String>,
}

/// Top-level validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Directory holding `.tal` files
    pub tal_directory: PathBuf,
    pub cache: CacheSettings,
    pub fetch: FetchSettings,
    pub validation: ValidationSettings,
    pub logging: LoggingSettings,
    pub metrics: MetricsSettings,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            tal_directory: PathBuf::from("tals"),
            cache: CacheSettings::default(),
            fetch: FetchSettings::default(),
            validation: ValidationSettings::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl ValidatorConfig {
    /// Build the configuration from defaults, an optional file and the
    /// environment, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::SourceNotFound(path.display().to_string()));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            tal_directory = %config.tal_directory.display(),
            cache_backend = ?config.cache.backend,
            interval_minutes = config.validation.interval_minutes,
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tal_directory.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError("tal_directory cannot be empty".to_string()));
        }
        if self.cache.backend == CacheBackend::Sqlite && self.cache.sqlite_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "cache.sqlite_path is required for the sqlite backend".to_string(),
            ));
        }
        if self.cache.max_connections == 0 {
            return Err(ConfigError::ValidationError("cache.max_connections must be positive".to_string()));
        }
        if self.fetch.rsync_binary.trim().is_empty() {
            return Err(ConfigError::ValidationError("fetch.rsync_binary cannot be empty".to_string()));
        }
        if self.fetch.rsync_timeout_secs == 0 || self.fetch.http_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("fetch timeouts must be positive".to_string()));
        }
        if self.validation.interval_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "validation.interval_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
