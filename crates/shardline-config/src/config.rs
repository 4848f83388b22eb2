// crates/shardline-config/src/config.rs
// ============================================================================
// Module: Shardline Configuration
// Description: Configuration loading and validation for Shardline.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: shardline-core, shardline-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys are rejected. The physical shard count is part of the data
//! layout: changing it for an existing store directory re-routes executions
//! and requires a migration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::num::NonZeroU32;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use shardline_core::ShardRouter;
use shardline_store_sqlite::SqliteJournalMode;
use shardline_store_sqlite::SqliteMapStoreConfig;
use shardline_store_sqlite::SqliteSyncMode;
use shardline_core::MapStoreError;
use shardline_store_sqlite::config::DEFAULT_BUSY_TIMEOUT_MS;
use shardline_store_sqlite::config::DEFAULT_READ_POOL_SIZE;
use shardline_store_sqlite::config::MAX_DB_SHARDS;
use thiserror::Error;

use crate::logging::parse_filter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "shardline.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SHARDLINE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a log filter directive.
const MAX_LOG_FILTER_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShardlineConfig {
    /// Persistence configuration.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Execution map persistence configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Number of physical database shards.
    #[serde(default = "default_num_db_shards")]
    pub num_db_shards: u32,
    /// `SQLite` backend settings.
    #[serde(default)]
    pub sqlite: SqlitePersistenceConfig,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            num_db_shards: default_num_db_shards(),
            sqlite: SqlitePersistenceConfig::default(),
        }
    }
}

/// `SQLite` backend settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SqlitePersistenceConfig {
    /// Directory holding the shard database files.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Reader connections per shard.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for SqlitePersistenceConfig {
    fn default() -> Self {
        Self {
            directory: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// Newline-delimited JSON objects.
    Json,
}

impl LogFormat {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Json => "json",
        }
    }
}

/// Logging configuration.
///
/// # Invariants
/// - `filter` is an `EnvFilter` directive; `RUST_LOG` takes precedence.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl ShardlineConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: `path`, then `SHARDLINE_CONFIG`, then
    /// `shardline.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.persistence.validate()?;
        self.logging.validate()
    }

    /// Returns the shard router for the configured shard count.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the shard count is zero.
    pub fn router(&self) -> Result<ShardRouter, ConfigError> {
        Ok(ShardRouter::new(self.persistence.total_db_shards()?))
    }

    /// Builds the `SQLite` store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the store directory is missing
    /// or a store limit is out of range.
    pub fn sqlite_store_config(&self) -> Result<SqliteMapStoreConfig, ConfigError> {
        self.persistence.sqlite_store_config()
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

impl PersistenceConfig {
    /// Returns the validated physical shard count.
    fn total_db_shards(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.num_db_shards)
            .filter(|count| count.get() <= MAX_DB_SHARDS)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "persistence.num_db_shards must be between 1 and {MAX_DB_SHARDS}"
                ))
            })
    }

    /// Validates persistence configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.sqlite_store_config().map(|_| ())
    }

    /// Builds the store configuration and applies the store's own limits.
    fn sqlite_store_config(&self) -> Result<SqliteMapStoreConfig, ConfigError> {
        let num_db_shards = self.total_db_shards()?;
        let sqlite = &self.sqlite;
        let directory = sqlite.directory.as_deref().ok_or_else(|| {
            ConfigError::Invalid("persistence.sqlite.directory is required".to_string())
        })?;
        validate_path_string("persistence.sqlite.directory", &directory.to_string_lossy())?;
        let mut store =
            SqliteMapStoreConfig::new(directory).with_num_db_shards(num_db_shards.get());
        store.busy_timeout_ms = sqlite.busy_timeout_ms;
        store.journal_mode = sqlite.journal_mode;
        store.sync_mode = sqlite.sync_mode;
        store.read_pool_size = sqlite.read_pool_size;
        store.validate().map_err(|err| match err {
            MapStoreError::Invalid(message) => {
                ConfigError::Invalid(format!("persistence.sqlite.{message}"))
            }
            other => ConfigError::Invalid(other.to_string()),
        })?;
        Ok(store)
    }
}

impl LoggingConfig {
    /// Validates logging settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let filter = self.filter.trim();
        if filter.is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        if filter.len() > MAX_LOG_FILTER_LENGTH {
            return Err(ConfigError::Invalid("logging.filter exceeds max length".to_string()));
        }
        parse_filter(filter).map(|_| ())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the default physical shard count.
const fn default_num_db_shards() -> u32 {
    1
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default reader pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

/// Returns the default log filter.
fn default_log_filter() -> String {
    "info".to_string()
}

/// Resolves the config path from explicit input or environment.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if Path::new(trimmed)
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid(format!("{field} path component too long")));
    }
    Ok(())
}
