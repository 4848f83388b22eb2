// crates/shardline-store-sqlite/src/config.rs
// ============================================================================
// Module: SQLite Map Store Configuration
// Description: Directory, pragma, and pool settings for the SQLite store.
// Purpose: Describe how shard databases are opened.
// Dependencies: serde, shardline-core
// ============================================================================

//! ## Overview
//! One configuration describes every physical shard: shard `n` lives in
//! `directory/shard-NNNN.db` and all shards share pragmas and pool size.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroU32;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use shardline_core::DbShardId;
use shardline_core::MapStoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum busy timeout (ms).
pub const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;
/// Default read connections per shard.
pub const DEFAULT_READ_POOL_SIZE: usize = 4;
/// Maximum read connections per shard.
pub const MAX_READ_POOL_SIZE: usize = 64;
/// Maximum physical shards one store may open.
pub const MAX_DB_SHARDS: u32 = 1024;

// ============================================================================
// SECTION: Pragmas
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode; readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal with delete-on-commit.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the sharded `SQLite` map store.
///
/// # Invariants
/// - `directory` is a directory; shard files are created inside it.
/// - `num_db_shards` is in `1..=MAX_DB_SHARDS` and must not change for an
///   existing directory without migrating data.
/// - `read_pool_size` is in `1..=MAX_READ_POOL_SIZE`.
/// - `busy_timeout_ms` is in `1..=MAX_BUSY_TIMEOUT_MS`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteMapStoreConfig {
    /// Directory holding one database file per physical shard.
    pub directory: PathBuf,
    /// Number of physical shards.
    #[serde(default = "default_num_db_shards")]
    pub num_db_shards: u32,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Read-only connections per shard.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteMapStoreConfig {
    /// Creates a single-shard configuration with default pragmas.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            num_db_shards: default_num_db_shards(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }

    /// Returns a copy spread over `num_db_shards` physical shards.
    #[must_use]
    pub fn with_num_db_shards(mut self, num_db_shards: u32) -> Self {
        self.num_db_shards = num_db_shards;
        self
    }

    /// Returns the validated shard count.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError::Invalid`] when the count is zero or too large.
    pub fn total_db_shards(&self) -> Result<NonZeroU32, MapStoreError> {
        NonZeroU32::new(self.num_db_shards)
            .filter(|count| count.get() <= MAX_DB_SHARDS)
            .ok_or_else(|| {
                MapStoreError::Invalid(format!(
                    "num_db_shards must be between 1 and {MAX_DB_SHARDS}"
                ))
            })
    }

    /// Returns the configured busy timeout.
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Returns the database file path for one physical shard.
    #[must_use]
    pub fn shard_path(&self, db_shard: DbShardId) -> PathBuf {
        shard_path_in(&self.directory, db_shard)
    }

    /// Validates numeric limits.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError::Invalid`] when a limit is out of range.
    pub fn validate(&self) -> Result<(), MapStoreError> {
        self.total_db_shards()?;
        if self.read_pool_size == 0 || self.read_pool_size > MAX_READ_POOL_SIZE {
            return Err(MapStoreError::Invalid(format!(
                "read_pool_size must be between 1 and {MAX_READ_POOL_SIZE}"
            )));
        }
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(MapStoreError::Invalid(format!(
                "busy_timeout_ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Returns the default physical shard count.
const fn default_num_db_shards() -> u32 {
    1
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

/// Joins a shard file name onto `directory`.
fn shard_path_in(directory: &Path, db_shard: DbShardId) -> PathBuf {
    directory.join(format!("shard-{:04}.db", db_shard.get()))
}
