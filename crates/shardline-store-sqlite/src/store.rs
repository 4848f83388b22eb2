// crates/shardline-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Execution Map Store
// Description: ExecutionMapStore backed by one SQLite database per shard.
// Purpose: Persist per-execution maps with single-statement operations.
// Dependencies: rusqlite, shardline-core, tracing
// ============================================================================

//! ## Overview
//! [`SqliteExecutionMapStore`] opens one database file per physical shard.
//! Each shard owns a writer connection behind a mutex and a small pool of
//! reader connections chosen round-robin. Every operation resolves its
//! physical shard from the logical shard id and runs exactly one statement
//! rendered from the shared [`SchemaRegistry`]; nothing is retried and no
//! transaction spans more than that statement.
//!
//! Security posture: statement text only ever contains schema identifiers
//! and placeholders; every caller-supplied value is bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::RefCell;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::TryLockError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::ToSql;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::ToSqlOutput;
use shardline_core::ActivityInfoMapsRow;
use shardline_core::CallContext;
use shardline_core::ChildExecutionInfoMapsRow;
use shardline_core::DbShardId;
use shardline_core::EXECUTION_COLUMNS;
use shardline_core::ExecResult;
use shardline_core::ExecutionFilter;
use shardline_core::ExecutionMapStore;
use shardline_core::KeySet;
use shardline_core::MapKind;
use shardline_core::MapStoreError;
use shardline_core::RequestCancelInfoMapsRow;
use shardline_core::SchemaRegistry;
use shardline_core::ShardRouter;
use shardline_core::SignalInfoMapsRow;
use shardline_core::SignalsRequestedSetsRow;
use shardline_core::SqliteDialect;
use shardline_core::TimerInfoMapsRow;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::codec::MapRowCodec;
use crate::codec::bind_execution;
use crate::config::SqliteMapStoreConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for shard databases.
pub const SCHEMA_VERSION: i64 = 1;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Pause between lock attempts while a context is live.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(2);
/// Virtual machine steps between cancellation checks of a running statement.
const PROGRESS_CHECK_OPS: i32 = 1_000;

/// Map tables of schema version 1.
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS activity_info_maps (
    shard_id INTEGER NOT NULL,
    domain_id TEXT NOT NULL,
    workflow_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    schedule_id INTEGER NOT NULL,
    data BLOB NOT NULL,
    data_encoding TEXT NOT NULL,
    last_heartbeat_details BLOB NOT NULL,
    last_heartbeat_updated_time INTEGER NOT NULL,
    PRIMARY KEY (shard_id, domain_id, workflow_id, run_id, schedule_id)
);
CREATE TABLE IF NOT EXISTS timer_info_maps (
    shard_id INTEGER NOT NULL,
    domain_id TEXT NOT NULL,
    workflow_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    timer_id TEXT NOT NULL,
    data BLOB NOT NULL,
    data_encoding TEXT NOT NULL,
    PRIMARY KEY (shard_id, domain_id, workflow_id, run_id, timer_id)
);
CREATE TABLE IF NOT EXISTS child_execution_info_maps (
    shard_id INTEGER NOT NULL,
    domain_id TEXT NOT NULL,
    workflow_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    initiated_id INTEGER NOT NULL,
    data BLOB NOT NULL,
    data_encoding TEXT NOT NULL,
    PRIMARY KEY (shard_id, domain_id, workflow_id, run_id, initiated_id)
);
CREATE TABLE IF NOT EXISTS request_cancel_info_maps (
    shard_id INTEGER NOT NULL,
    domain_id TEXT NOT NULL,
    workflow_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    initiated_id INTEGER NOT NULL,
    data BLOB NOT NULL,
    data_encoding TEXT NOT NULL,
    PRIMARY KEY (shard_id, domain_id, workflow_id, run_id, initiated_id)
);
CREATE TABLE IF NOT EXISTS signal_info_maps (
    shard_id INTEGER NOT NULL,
    domain_id TEXT NOT NULL,
    workflow_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    initiated_id INTEGER NOT NULL,
    data BLOB NOT NULL,
    data_encoding TEXT NOT NULL,
    PRIMARY KEY (shard_id, domain_id, workflow_id, run_id, initiated_id)
);
CREATE TABLE IF NOT EXISTS signals_requested_sets (
    shard_id INTEGER NOT NULL,
    domain_id TEXT NOT NULL,
    workflow_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    signal_id TEXT NOT NULL,
    PRIMARY KEY (shard_id, domain_id, workflow_id, run_id, signal_id)
);
";

// ============================================================================
// SECTION: Store
// ============================================================================

/// Sharded `SQLite` execution map store.
///
/// # Invariants
/// - `shards[n]` holds the database of physical shard `n`.
/// - Writes to one shard are serialized through its writer mutex.
/// - Templates are built once at open and never change.
#[derive(Clone)]
pub struct SqliteExecutionMapStore {
    /// Store configuration.
    config: SqliteMapStoreConfig,
    /// Logical to physical shard router.
    router: ShardRouter,
    /// Statement templates for every map kind.
    registry: Arc<SchemaRegistry>,
    /// Connection pools indexed by physical shard.
    shards: Arc<Vec<ShardPool>>,
}

/// Connections of one physical shard.
struct ShardPool {
    /// Physical shard index.
    db_shard: DbShardId,
    /// Database file path.
    path: PathBuf,
    /// Configured busy timeout restored after each watched statement.
    busy_timeout: Duration,
    /// Writer connection guarded by a mutex.
    write_connection: Mutex<Connection>,
    /// Reader connections used round-robin.
    read_connections: Vec<Mutex<Connection>>,
    /// Round-robin cursor for reader selection.
    read_cursor: AtomicUsize,
}

impl SqliteExecutionMapStore {
    /// Opens (creating when missing) every shard database under the
    /// configured directory.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when the configuration is invalid, a path is
    /// unsafe, or a database cannot be opened or initialized.
    pub fn open(config: SqliteMapStoreConfig) -> Result<Self, MapStoreError> {
        config.validate()?;
        let router = ShardRouter::new(config.total_db_shards()?);
        validate_store_directory(&config.directory)?;
        std::fs::create_dir_all(&config.directory)
            .map_err(|err| MapStoreError::Io(err.to_string()))?;
        let registry = Arc::new(SchemaRegistry::new(Arc::new(SqliteDialect))?);
        let shards = router
            .db_shards()
            .map(|db_shard| ShardPool::open(&config, db_shard))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            directory = %config.directory.display(),
            db_shards = shards.len(),
            journal_mode = config.journal_mode.pragma_value(),
            "sqlite execution map store opened"
        );
        Ok(Self {
            config,
            router,
            registry,
            shards: Arc::new(shards),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteMapStoreConfig {
        &self.config
    }

    /// Returns the shard router.
    #[must_use]
    pub const fn router(&self) -> ShardRouter {
        self.router
    }

    /// Returns the statement templates used by this store.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Returns the database file of one physical shard.
    #[must_use]
    pub fn shard_path(&self, db_shard: DbShardId) -> Option<&Path> {
        self.shards.get(db_shard.index()).map(|pool| pool.path.as_path())
    }

    /// Verifies every shard can execute a trivial statement.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when a connection is poisoned or fails.
    pub fn readiness(&self, ctx: &CallContext) -> Result<(), MapStoreError> {
        for pool in self.shards.iter() {
            pool.query(ctx, "SELECT 1", &[], |row| row.get::<_, i64>(0))?;
        }
        Ok(())
    }

    /// Returns the pool for the shard owning `filter`.
    fn pool_for(&self, execution: &ExecutionFilter) -> Result<&ShardPool, MapStoreError> {
        let db_shard = self.router.resolve(execution.shard_id);
        self.shards.get(db_shard.index()).ok_or_else(|| {
            MapStoreError::Invalid(format!("db shard {db_shard} is not open in this store"))
        })
    }

    /// Upserts a batch of rows of one kind in a single statement.
    fn replace_rows<R: MapRowCodec>(
        &self,
        ctx: &CallContext,
        rows: &[R],
    ) -> Result<ExecResult, MapStoreError> {
        let Some(first) = rows.first() else {
            return Ok(ExecResult::default());
        };
        let expected = self.router.resolve(first.execution().shard_id);
        if let Some(found) = rows
            .iter()
            .map(|row| self.router.resolve(row.execution().shard_id))
            .find(|found| *found != expected)
        {
            return Err(MapStoreError::MixedShardBatch {
                expected,
                found,
            });
        }
        let templates = self.registry.get(R::KIND);
        let sql = templates.upsert_statement(rows.len())?;
        let mut values = Vec::with_capacity(rows.len() * templates.schema().columns_per_row());
        for row in rows {
            bind_execution(row.execution(), &mut values);
            row.bind_row(&mut values)?;
        }
        let pool = self.pool_for(first.execution())?;
        let affected = pool.execute(ctx, &sql, &values)?;
        debug!(
            kind = %R::KIND,
            db_shard = %pool.db_shard,
            rows = rows.len(),
            affected,
            "execution map rows replaced"
        );
        Ok(ExecResult::new(affected))
    }

    /// Reads every row of one kind for an execution.
    fn select_rows<R: MapRowCodec>(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<R>, MapStoreError> {
        let pool = self.pool_for(filter)?;
        let mut values = Vec::with_capacity(EXECUTION_COLUMNS.len());
        bind_execution(filter, &mut values);
        let rows = pool.query(ctx, self.registry.get(R::KIND).select_all(), &values, |row| {
            R::decode(filter, row)
        })?;
        debug!(
            kind = %R::KIND,
            db_shard = %pool.db_shard,
            rows = rows.len(),
            "execution map rows selected"
        );
        Ok(rows)
    }

    /// Deletes rows of one kind, either every row or the listed keys.
    fn delete_rows<K: ToSql>(
        &self,
        ctx: &CallContext,
        kind: MapKind,
        filter: &ExecutionFilter,
        keys: &KeySet<K>,
    ) -> Result<ExecResult, MapStoreError> {
        let templates = self.registry.get(kind);
        let mut values = Vec::with_capacity(EXECUTION_COLUMNS.len());
        bind_execution(filter, &mut values);
        let sql = match keys {
            KeySet::All => templates.delete_all().to_string(),
            KeySet::Only(keys) if keys.is_empty() => return Ok(ExecResult::default()),
            KeySet::Only(keys) => {
                let sql = templates.delete_keys_statement(keys.len())?;
                values.reserve(keys.len());
                for key in keys {
                    let bound =
                        key.to_sql().map_err(|err| MapStoreError::Invalid(err.to_string()))?;
                    values.push(bound);
                }
                sql
            }
        };
        let pool = self.pool_for(filter)?;
        let affected = pool.execute(ctx, &sql, &values)?;
        debug!(
            kind = %kind,
            db_shard = %pool.db_shard,
            all = matches!(keys, KeySet::All),
            affected,
            "execution map rows deleted"
        );
        Ok(ExecResult::new(affected))
    }
}

// ============================================================================
// SECTION: Shard Pool
// ============================================================================

impl ShardPool {
    /// Opens the writer and reader connections of one shard.
    fn open(config: &SqliteMapStoreConfig, db_shard: DbShardId) -> Result<Self, MapStoreError> {
        let path = config.shard_path(db_shard);
        validate_store_path(&path)?;
        let mut write_connection = open_connection(&path, config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_connection(&path, config)?));
        }
        Ok(Self {
            db_shard,
            path,
            busy_timeout: config.busy_timeout(),
            write_connection: Mutex::new(write_connection),
            read_connections,
            read_cursor: AtomicUsize::new(0),
        })
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> &Mutex<Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        &self.read_connections[index]
    }

    /// Executes one mutating statement on the writer connection.
    fn execute(
        &self,
        ctx: &CallContext,
        sql: &str,
        values: &[ToSqlOutput<'_>],
    ) -> Result<u64, MapStoreError> {
        ctx.check()?;
        let connection = lock_within(&self.write_connection, ctx, "write")?;
        ctx.check()?;
        let watch = StatementWatch::install(&connection, ctx, self.busy_timeout)?;
        let result = connection
            .prepare_cached(sql)
            .and_then(|mut statement| statement.execute(params_from_iter(values.iter())));
        drop(watch);
        let changed = result.map_err(|err| self.backend_error(ctx, &err))?;
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }

    /// Runs one query on a reader connection and decodes every row.
    fn query<T, F>(
        &self,
        ctx: &CallContext,
        sql: &str,
        values: &[ToSqlOutput<'_>],
        decode: F,
    ) -> Result<Vec<T>, MapStoreError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        ctx.check()?;
        let connection = lock_within(self.read_connection(), ctx, "read")?;
        ctx.check()?;
        let watch = StatementWatch::install(&connection, ctx, self.busy_timeout)?;
        let result = connection.prepare_cached(sql).and_then(|mut statement| {
            let rows = statement.query_map(params_from_iter(values.iter()), decode)?;
            rows.collect::<rusqlite::Result<Vec<T>>>()
        });
        drop(watch);
        result.map_err(|err| self.backend_error(ctx, &err))
    }

    /// Maps a driver failure, preferring the context error when the
    /// deadline or cancellation ended the statement.
    fn backend_error(&self, ctx: &CallContext, err: &rusqlite::Error) -> MapStoreError {
        if is_aborted_wait(err)
            && let Err(ctx_err) = ctx.check()
        {
            return ctx_err;
        }
        warn!(db_shard = %self.db_shard, error = %err, "sqlite statement failed");
        MapStoreError::Backend(err.to_string())
    }
}

// ============================================================================
// SECTION: Statement Watch
// ============================================================================

/// Lock wait state of the statement running on this thread.
struct LockWait {
    /// Context of the running statement.
    ctx: CallContext,
    /// When the wait started.
    started: Instant,
    /// Longest total wait allowed.
    limit: Duration,
}

thread_local! {
    /// Set while a watched statement runs on this thread.
    static ACTIVE_LOCK_WAIT: RefCell<Option<LockWait>> = const { RefCell::new(None) };
}

/// Busy handler: keeps waiting while the context is live and the wait
/// budget lasts.
fn wait_for_lock(_attempt: i32) -> bool {
    ACTIVE_LOCK_WAIT.with(|slot| {
        let slot = slot.borrow();
        let Some(wait) = slot.as_ref() else {
            return false;
        };
        if wait.ctx.check().is_err() {
            return false;
        }
        let Some(left) =
            wait.limit.checked_sub(wait.started.elapsed()).filter(|left| !left.is_zero())
        else {
            return false;
        };
        thread::sleep(left.min(LOCK_POLL_INTERVAL));
        true
    })
}

/// Cancellation and deadline watch over one statement.
///
/// While installed, lock waits end as soon as the context is cancelled or
/// expires (or the configured busy timeout passes), and a running statement
/// is interrupted through the progress handler. Dropping the watch restores
/// the configured busy timeout.
struct StatementWatch<'c> {
    /// Connection the handlers are installed on.
    connection: &'c Connection,
    /// Busy timeout to restore.
    busy_timeout: Duration,
}

impl<'c> StatementWatch<'c> {
    /// Installs the busy and progress handlers for `ctx`.
    fn install(
        connection: &'c Connection,
        ctx: &CallContext,
        busy_timeout: Duration,
    ) -> Result<Self, MapStoreError> {
        let watch = Self {
            connection,
            busy_timeout,
        };
        let limit = ctx.remaining().map_or(busy_timeout, |remaining| remaining.min(busy_timeout));
        ACTIVE_LOCK_WAIT.with(|slot| {
            *slot.borrow_mut() = Some(LockWait {
                ctx: ctx.clone(),
                started: Instant::now(),
                limit,
            });
        });
        connection
            .busy_handler(Some(wait_for_lock))
            .map_err(|err| MapStoreError::Backend(err.to_string()))?;
        let watched = ctx.clone();
        connection
            .progress_handler(PROGRESS_CHECK_OPS, Some(move || watched.check().is_err()))
            .map_err(|err| MapStoreError::Backend(err.to_string()))?;
        Ok(watch)
    }
}

impl Drop for StatementWatch<'_> {
    fn drop(&mut self) {
        ACTIVE_LOCK_WAIT.with(|slot| slot.borrow_mut().take());
        // The statement outcome stands even when the handlers cannot be reset.
        if let Err(err) = self.connection.progress_handler(0, None::<fn() -> bool>) {
            warn!(error = %err, "sqlite progress handler not cleared");
        }
        if let Err(err) = self.connection.busy_timeout(self.busy_timeout) {
            warn!(error = %err, "sqlite busy timeout not restored");
        }
    }
}

/// Acquires a connection mutex, giving up when the context ends.
fn lock_within<'m>(
    connection: &'m Mutex<Connection>,
    ctx: &CallContext,
    role: &str,
) -> Result<MutexGuard<'m, Connection>, MapStoreError> {
    loop {
        match connection.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(_)) => {
                return Err(MapStoreError::Io(format!("sqlite {role} mutex poisoned")));
            }
            Err(TryLockError::WouldBlock) => {
                ctx.check()?;
                let pause = ctx
                    .remaining()
                    .map_or(LOCK_POLL_INTERVAL, |remaining| remaining.min(LOCK_POLL_INTERVAL));
                thread::sleep(pause);
            }
        }
    }
}

// ============================================================================
// SECTION: Store Contract
// ============================================================================

impl ExecutionMapStore for SqliteExecutionMapStore {
    fn replace_into_activity_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[ActivityInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        self.replace_rows(ctx, rows)
    }

    fn select_from_activity_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ActivityInfoMapsRow>, MapStoreError> {
        self.select_rows(ctx, filter)
    }

    fn delete_from_activity_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        schedule_ids: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete_rows(ctx, MapKind::ActivityInfo, filter, schedule_ids)
    }

    fn replace_into_timer_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[TimerInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        self.replace_rows(ctx, rows)
    }

    fn select_from_timer_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<TimerInfoMapsRow>, MapStoreError> {
        self.select_rows(ctx, filter)
    }

    fn delete_from_timer_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        timer_ids: &KeySet<String>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete_rows(ctx, MapKind::TimerInfo, filter, timer_ids)
    }

    fn replace_into_child_execution_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[ChildExecutionInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        self.replace_rows(ctx, rows)
    }

    fn select_from_child_execution_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ChildExecutionInfoMapsRow>, MapStoreError> {
        self.select_rows(ctx, filter)
    }

    fn delete_from_child_execution_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        initiated_ids: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete_rows(ctx, MapKind::ChildExecutionInfo, filter, initiated_ids)
    }

    fn replace_into_request_cancel_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[RequestCancelInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        self.replace_rows(ctx, rows)
    }

    fn select_from_request_cancel_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<RequestCancelInfoMapsRow>, MapStoreError> {
        self.select_rows(ctx, filter)
    }

    fn delete_from_request_cancel_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        initiated_ids: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete_rows(ctx, MapKind::RequestCancelInfo, filter, initiated_ids)
    }

    fn replace_into_signal_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[SignalInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        self.replace_rows(ctx, rows)
    }

    fn select_from_signal_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<SignalInfoMapsRow>, MapStoreError> {
        self.select_rows(ctx, filter)
    }

    fn delete_from_signal_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        initiated_ids: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete_rows(ctx, MapKind::SignalInfo, filter, initiated_ids)
    }

    fn insert_into_signals_requested_sets(
        &self,
        ctx: &CallContext,
        rows: &[SignalsRequestedSetsRow],
    ) -> Result<ExecResult, MapStoreError> {
        self.replace_rows(ctx, rows)
    }

    fn select_from_signals_requested_sets(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<SignalsRequestedSetsRow>, MapStoreError> {
        self.select_rows(ctx, filter)
    }

    fn delete_from_signals_requested_sets(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        signal_ids: &KeySet<String>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete_rows(ctx, MapKind::SignalsRequested, filter, signal_ids)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when `err` ended a lock wait or interrupted a statement.
fn is_aborted_wait(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::OperationInterrupted
        )
    )
}

/// Validates the store directory path for safety limits.
fn validate_store_directory(path: &Path) -> Result<(), MapStoreError> {
    validate_path_lengths(path, "store directory")?;
    if path.exists() && !path.is_dir() {
        return Err(MapStoreError::Invalid("store directory must be a directory".to_string()));
    }
    Ok(())
}

/// Validates a shard database path for safety limits.
fn validate_store_path(path: &Path) -> Result<(), MapStoreError> {
    validate_path_lengths(path, "store path")?;
    if path.exists() && path.is_dir() {
        return Err(MapStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Rejects empty paths, overlong paths, and overlong components.
fn validate_path_lengths(path: &Path, label: &str) -> Result<(), MapStoreError> {
    if path.as_os_str().is_empty() {
        return Err(MapStoreError::Invalid(format!("{label} must not be empty")));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(MapStoreError::Invalid(format!("{label} exceeds length limit")));
    }
    if path
        .components()
        .any(|component| component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(MapStoreError::Invalid(format!("{label} contains an overlong component")));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(
    path: &Path,
    config: &SqliteMapStoreConfig,
) -> Result<Connection, MapStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(path, flags)
        .map_err(|err| MapStoreError::Backend(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies journal, sync, and busy-timeout pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteMapStoreConfig,
) -> Result<(), MapStoreError> {
    connection
        .busy_timeout(config.busy_timeout())
        .map_err(|err| MapStoreError::Backend(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| MapStoreError::Backend(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| MapStoreError::Backend(err.to_string()))?;
    Ok(())
}

/// Creates the map tables or validates the existing schema version.
fn initialize_schema(connection: &mut Connection) -> Result<(), MapStoreError> {
    let tx = connection.transaction().map_err(|err| MapStoreError::Backend(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| MapStoreError::Backend(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| MapStoreError::Backend(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| MapStoreError::Backend(err.to_string()))?;
            tx.execute_batch(SCHEMA_DDL).map_err(|err| MapStoreError::Backend(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(MapStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| MapStoreError::Backend(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;
    use std::time::Instant;

    use rusqlite::Connection;
    use shardline_core::CallContext;
    use shardline_core::MapStoreError;

    use super::StatementWatch;
    use super::lock_within;

    fn busy_timeout_ms(connection: &Connection) -> i64 {
        connection.query_row("PRAGMA busy_timeout", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn dropping_the_watch_restores_the_busy_timeout() {
        let connection = Connection::open_in_memory().unwrap();
        connection.busy_timeout(Duration::from_millis(750)).unwrap();
        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        let watch = StatementWatch::install(&connection, &ctx, Duration::from_millis(750)).unwrap();
        assert_eq!(busy_timeout_ms(&connection), 0);
        drop(watch);
        assert_eq!(busy_timeout_ms(&connection), 750);
    }

    #[test]
    fn progress_handler_interrupts_a_cancelled_statement() {
        let connection = Connection::open_in_memory().unwrap();
        let ctx = CallContext::background();
        let watch = StatementWatch::install(&connection, &ctx, Duration::from_secs(1)).unwrap();
        ctx.cancel_handle().cancel();
        let err = connection
            .query_row(
                "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n) \
                 SELECT count(*) FROM n",
                [],
                |row| row.get::<_, i64>(0),
            )
            .unwrap_err();
        drop(watch);
        assert_eq!(err.sqlite_error_code(), Some(rusqlite::ErrorCode::OperationInterrupted));
    }

    #[test]
    fn mutex_wait_ends_at_the_deadline() {
        let connection = Mutex::new(Connection::open_in_memory().unwrap());
        let _held = connection.lock().unwrap();
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let started = Instant::now();
        let err = lock_within(&connection, &ctx, "write").err().unwrap();
        assert_eq!(err, MapStoreError::DeadlineExceeded);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
