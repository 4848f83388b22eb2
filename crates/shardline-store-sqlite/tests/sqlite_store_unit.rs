// crates/shardline-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Integrity Unit Tests
// Description: Sharding, setup, cancellation, and concurrency checks.
// Purpose: Validate path safety, schema versioning, routing, and lock waits.
// ============================================================================

//! ## Overview
//! Unit-level tests for `SQLite` store invariants:
//! - Path safety checks and configuration limits
//! - Schema version validation
//! - Physical shard routing and mixed-shard batch rejection
//! - Call context cancellation and deadline capping of lock waits
//! - Concurrency (multi-threaded disjoint writes converge)

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use rusqlite::Connection;
use rusqlite::params;
use shardline_core::ActivityInfoMapsRow;
use shardline_core::CallContext;
use shardline_core::CancelHandle;
use shardline_core::DbShardId;
use shardline_core::ExecutionFilter;
use shardline_core::ExecutionMapStore;
use shardline_core::KeySet;
use shardline_core::MapPayload;
use shardline_core::MapStoreError;
use shardline_core::ShardId;
use shardline_core::TimerInfoMapsRow;
use shardline_store_sqlite::SqliteExecutionMapStore;
use shardline_store_sqlite::SqliteJournalMode;
use shardline_store_sqlite::SqliteMapStoreConfig;
use shardline_store_sqlite::config::MAX_BUSY_TIMEOUT_MS;
use tempfile::TempDir;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_in(dir: &TempDir, num_db_shards: u32) -> SqliteMapStoreConfig {
    SqliteMapStoreConfig::new(dir.path().join("maps")).with_num_db_shards(num_db_shards)
}

fn execution(shard: u32) -> ExecutionFilter {
    ExecutionFilter::new(ShardId::new(shard), "domain", "workflow", "run")
}

fn timer(execution: &ExecutionFilter, timer_id: &str) -> TimerInfoMapsRow {
    TimerInfoMapsRow {
        execution: execution.clone(),
        timer_id: timer_id.to_string(),
        payload: MapPayload::new(b"payload".to_vec(), "raw"),
    }
}

fn activity(execution: &ExecutionFilter, schedule_id: i64) -> ActivityInfoMapsRow {
    ActivityInfoMapsRow {
        execution: execution.clone(),
        schedule_id,
        payload: MapPayload::new(schedule_id.to_be_bytes().to_vec(), "raw"),
        last_heartbeat_details: Vec::new(),
        last_heartbeat_updated_time: OffsetDateTime::UNIX_EPOCH,
    }
}

fn count_rows(path: &Path, table: &str) -> i64 {
    let connection = Connection::open(path).unwrap();
    connection.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0)).unwrap()
}

// ============================================================================
// SECTION: Setup
// ============================================================================

#[test]
fn open_creates_one_database_per_shard() {
    let dir = TempDir::new().unwrap();
    let store = SqliteExecutionMapStore::open(config_in(&dir, 3)).unwrap();
    for shard in 0 .. 3 {
        let path = store.shard_path(DbShardId::new(shard)).unwrap();
        assert!(path.is_file(), "missing {}", path.display());
        assert!(path.ends_with(format!("shard-{shard:04}.db")));
    }
    assert!(store.shard_path(DbShardId::new(3)).is_none());
    store.readiness(&CallContext::background()).unwrap();
}

#[test]
fn reopening_keeps_existing_rows() {
    let dir = TempDir::new().unwrap();
    let exec = execution(1);
    {
        let store = SqliteExecutionMapStore::open(config_in(&dir, 1)).unwrap();
        let ctx = CallContext::background();
        store.replace_into_timer_info_maps(&ctx, &[timer(&exec, "t")]).unwrap();
    }
    let store = SqliteExecutionMapStore::open(config_in(&dir, 1)).unwrap();
    let rows = store.select_from_timer_info_maps(&CallContext::background(), &exec).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn unsupported_schema_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = {
        let store = SqliteExecutionMapStore::open(config_in(&dir, 1)).unwrap();
        store.shard_path(DbShardId::new(0)).unwrap().to_path_buf()
    };
    Connection::open(&path)
        .unwrap()
        .execute("UPDATE store_meta SET version = ?1", params![99])
        .unwrap();
    let err = SqliteExecutionMapStore::open(config_in(&dir, 1)).err().expect("version mismatch");
    assert!(matches!(err, MapStoreError::VersionMismatch(_)));
}

#[test]
fn directory_path_must_not_be_a_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("occupied");
    std::fs::write(&file, b"x").unwrap();
    let err = SqliteExecutionMapStore::open(SqliteMapStoreConfig::new(&file)).err().unwrap();
    assert!(matches!(err, MapStoreError::Invalid(_)));
}

#[test]
fn overlong_path_components_are_rejected() {
    let dir = TempDir::new().unwrap();
    let config = SqliteMapStoreConfig::new(dir.path().join("a".repeat(300)));
    let err = SqliteExecutionMapStore::open(config).err().unwrap();
    assert!(matches!(err, MapStoreError::Invalid(_)));
}

#[test]
fn config_limits_are_enforced() {
    let dir = TempDir::new().unwrap();
    let zero_shards = config_in(&dir, 0);
    assert!(matches!(zero_shards.validate(), Err(MapStoreError::Invalid(_))));
    let too_many = config_in(&dir, 1025);
    assert!(matches!(too_many.validate(), Err(MapStoreError::Invalid(_))));
    let mut no_readers = config_in(&dir, 1);
    no_readers.read_pool_size = 0;
    assert!(SqliteExecutionMapStore::open(no_readers).is_err());
    let mut endless_wait = config_in(&dir, 1);
    endless_wait.busy_timeout_ms = MAX_BUSY_TIMEOUT_MS + 1;
    assert_eq!(
        endless_wait.validate(),
        Err(MapStoreError::Invalid(format!(
            "busy_timeout_ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
        )))
    );
    endless_wait.busy_timeout_ms = MAX_BUSY_TIMEOUT_MS;
    assert!(endless_wait.validate().is_ok());
}

#[test]
fn delete_journal_mode_opens() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir, 1);
    config.journal_mode = SqliteJournalMode::Delete;
    let store = SqliteExecutionMapStore::open(config).unwrap();
    let row = timer(&execution(0), "t");
    store.replace_into_timer_info_maps(&CallContext::background(), &[row]).unwrap();
}

// ============================================================================
// SECTION: Routing
// ============================================================================

#[test]
fn rows_land_in_the_routed_shard_database() {
    let dir = TempDir::new().unwrap();
    let store = SqliteExecutionMapStore::open(config_in(&dir, 4)).unwrap();
    let exec = execution(10);
    store.replace_into_timer_info_maps(&CallContext::background(), &[timer(&exec, "t")]).unwrap();

    let owning = store.shard_path(DbShardId::new(2)).unwrap();
    let other = store.shard_path(DbShardId::new(3)).unwrap();
    assert_eq!(count_rows(owning, "timer_info_maps"), 1);
    assert_eq!(count_rows(other, "timer_info_maps"), 0);
}

#[test]
fn mixed_shard_batches_are_rejected_before_writing() {
    let dir = TempDir::new().unwrap();
    let store = SqliteExecutionMapStore::open(config_in(&dir, 4)).unwrap();
    let ctx = CallContext::background();
    let rows = [timer(&execution(1), "a"), timer(&execution(2), "b")];
    let err = store.replace_into_timer_info_maps(&ctx, &rows).unwrap_err();
    assert_eq!(
        err,
        MapStoreError::MixedShardBatch {
            expected: DbShardId::new(1),
            found: DbShardId::new(2),
        }
    );
    assert!(store.select_from_timer_info_maps(&ctx, &execution(1)).unwrap().is_empty());

    let same_db_shard = [timer(&execution(1), "a"), timer(&execution(5), "b")];
    assert_eq!(store.replace_into_timer_info_maps(&ctx, &same_db_shard).unwrap().rows_affected, 2);
}

#[test]
fn oversized_batches_fail_without_writing() {
    let dir = TempDir::new().unwrap();
    let store = SqliteExecutionMapStore::open(config_in(&dir, 1)).unwrap();
    let exec = execution(0);
    let rows = (0 .. 3_641).map(|id| activity(&exec, id)).collect::<Vec<_>>();
    let ctx = CallContext::background();
    let err = store.replace_into_activity_info_maps(&ctx, &rows).unwrap_err();
    assert!(matches!(err, MapStoreError::ParameterExpansion(_)));
    assert!(store.select_from_activity_info_maps(&ctx, &exec).unwrap().is_empty());

    let written = store.replace_into_activity_info_maps(&ctx, &rows[.. 3_640]).unwrap();
    assert_eq!(written.rows_affected, 3_640);
}

// ============================================================================
// SECTION: Call Context
// ============================================================================

#[test]
fn cancelled_context_performs_no_io() {
    let dir = TempDir::new().unwrap();
    let store = SqliteExecutionMapStore::open(config_in(&dir, 1)).unwrap();
    let exec = execution(0);
    let ctx = CallContext::background();
    ctx.cancel_handle().cancel();

    assert_eq!(
        store.replace_into_timer_info_maps(&ctx, &[timer(&exec, "t")]),
        Err(MapStoreError::Cancelled)
    );
    assert_eq!(store.select_from_timer_info_maps(&ctx, &exec), Err(MapStoreError::Cancelled));
    assert_eq!(
        store.delete_from_timer_info_maps(&ctx, &exec, &KeySet::All),
        Err(MapStoreError::Cancelled)
    );
    let live = CallContext::background();
    assert!(store.select_from_timer_info_maps(&live, &exec).unwrap().is_empty());
}

#[test]
fn expired_deadline_is_reported() {
    let dir = TempDir::new().unwrap();
    let store = SqliteExecutionMapStore::open(config_in(&dir, 1)).unwrap();
    let ctx = CallContext::with_timeout(Duration::ZERO);
    let err = store.select_from_activity_info_maps(&ctx, &execution(0)).unwrap_err();
    assert_eq!(err, MapStoreError::DeadlineExceeded);
}

#[test]
fn lock_wait_is_capped_by_the_deadline() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir, 1);
    config.busy_timeout_ms = 60_000;
    let store = SqliteExecutionMapStore::open(config).unwrap();
    let blocker = Connection::open(store.shard_path(DbShardId::new(0)).unwrap()).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let ctx = CallContext::with_timeout(Duration::from_millis(200));
    let err = store.replace_into_timer_info_maps(&ctx, &[timer(&execution(0), "t")]).unwrap_err();
    assert_eq!(err, MapStoreError::DeadlineExceeded);

    blocker.execute_batch("ROLLBACK;").unwrap();
    let row = timer(&execution(0), "t");
    store.replace_into_timer_info_maps(&CallContext::background(), &[row]).unwrap();
}

#[test]
fn lock_wait_without_deadline_surfaces_backend_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir, 1);
    config.busy_timeout_ms = 10;
    let store = SqliteExecutionMapStore::open(config).unwrap();
    let blocker = Connection::open(store.shard_path(DbShardId::new(0)).unwrap()).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let err = store
        .replace_into_timer_info_maps(&CallContext::background(), &[timer(&execution(0), "t")])
        .unwrap_err();
    assert!(matches!(err, MapStoreError::Backend(_)));
    blocker.execute_batch("ROLLBACK;").unwrap();
}

#[test]
fn cancellation_ends_a_blocked_lock_wait() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir, 1);
    config.busy_timeout_ms = 3_000;
    let store = SqliteExecutionMapStore::open(config).unwrap();
    let blocker = Connection::open(store.shard_path(DbShardId::new(0)).unwrap()).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let cancel = CancelHandle::new();
    let ctx = CallContext::background().with_cancel(cancel.clone());
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        cancel.cancel();
    });
    let started = Instant::now();
    let err = store.replace_into_timer_info_maps(&ctx, &[timer(&execution(0), "t")]).unwrap_err();
    let elapsed = started.elapsed();
    canceller.join().unwrap();
    blocker.execute_batch("ROLLBACK;").unwrap();

    assert_eq!(err, MapStoreError::Cancelled);
    assert!(elapsed < Duration::from_secs(1), "cancelled wait took {elapsed:?}");
}

#[test]
fn queued_writer_honours_its_deadline() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir, 1);
    config.busy_timeout_ms = 3_000;
    let store = Arc::new(SqliteExecutionMapStore::open(config).unwrap());
    let blocker = Connection::open(store.shard_path(DbShardId::new(0)).unwrap()).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

    // Holds the writer mutex while waiting on the external lock.
    let holder = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            store.replace_into_timer_info_maps(&CallContext::background(), &[timer(
                &execution(0),
                "held",
            )])
        })
    };
    thread::sleep(Duration::from_millis(100));

    let ctx = CallContext::with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let err =
        store.replace_into_timer_info_maps(&ctx, &[timer(&execution(0), "queued")]).unwrap_err();
    let elapsed = started.elapsed();
    blocker.execute_batch("ROLLBACK;").unwrap();

    assert_eq!(err, MapStoreError::DeadlineExceeded);
    assert!(elapsed < Duration::from_secs(1), "queued writer waited {elapsed:?}");
    holder.join().unwrap().unwrap();
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn concurrent_disjoint_writes_converge_to_union() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteExecutionMapStore::open(config_in(&dir, 2)).unwrap());
    let exec = execution(7);
    let handles = (0 .. 8)
        .map(|worker| {
            let store = Arc::clone(&store);
            let exec = exec.clone();
            thread::spawn(move || {
                let ctx = CallContext::background();
                for offset in 0 .. 25 {
                    let row = activity(&exec, worker * 100 + offset);
                    store.replace_into_activity_info_maps(&ctx, &[row]).unwrap();
                    store.select_from_activity_info_maps(&ctx, &exec).unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }
    let rows = store.select_from_activity_info_maps(&CallContext::background(), &exec).unwrap();
    assert_eq!(rows.len(), 200);
}

#[test]
fn store_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SqliteExecutionMapStore>();
}
