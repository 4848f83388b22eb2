// crates/shardline-core/tests/purge.rs
// ============================================================================
// Module: Execution Purge Tests
// Description: Ordering and error propagation of purge_execution_maps.
// ============================================================================

//! ## Overview
//! Uses a recording store to check that purge issues delete-all for every
//! kind in a fixed order and stops at the first failure.

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

use std::sync::Mutex;

use shardline_core::ActivityInfoMapsRow;
use shardline_core::CallContext;
use shardline_core::ChildExecutionInfoMapsRow;
use shardline_core::ExecResult;
use shardline_core::ExecutionFilter;
use shardline_core::ExecutionMapStore;
use shardline_core::KeySet;
use shardline_core::MapKind;
use shardline_core::MapStoreError;
use shardline_core::RequestCancelInfoMapsRow;
use shardline_core::ShardId;
use shardline_core::SignalInfoMapsRow;
use shardline_core::SignalsRequestedSetsRow;
use shardline_core::TimerInfoMapsRow;
use shardline_core::purge_execution_maps;

// ============================================================================
// SECTION: Recording Store
// ============================================================================

/// Store that records deletes and fails on a chosen kind.
#[derive(Default)]
struct RecordingStore {
    deletes: Mutex<Vec<MapKind>>,
    fail_on: Option<MapKind>,
}

impl RecordingStore {
    fn delete<K>(&self, kind: MapKind, keys: &KeySet<K>) -> Result<ExecResult, MapStoreError> {
        assert!(matches!(keys, KeySet::All), "purge must delete every key");
        if self.fail_on == Some(kind) {
            return Err(MapStoreError::Backend(format!("{kind} unavailable")));
        }
        self.deletes.lock().unwrap().push(kind);
        Ok(ExecResult::new(u64::try_from(kind.index()).unwrap() + 1))
    }

    fn recorded(&self) -> Vec<MapKind> {
        self.deletes.lock().unwrap().clone()
    }
}

impl ExecutionMapStore for RecordingStore {
    fn replace_into_activity_info_maps(
        &self,
        _: &CallContext,
        _: &[ActivityInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        unreachable!("purge never writes")
    }

    fn select_from_activity_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
    ) -> Result<Vec<ActivityInfoMapsRow>, MapStoreError> {
        Ok(Vec::new())
    }

    fn delete_from_activity_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
        keys: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete(MapKind::ActivityInfo, keys)
    }

    fn replace_into_timer_info_maps(
        &self,
        _: &CallContext,
        _: &[TimerInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        unreachable!("purge never writes")
    }

    fn select_from_timer_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
    ) -> Result<Vec<TimerInfoMapsRow>, MapStoreError> {
        Ok(Vec::new())
    }

    fn delete_from_timer_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
        keys: &KeySet<String>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete(MapKind::TimerInfo, keys)
    }

    fn replace_into_child_execution_info_maps(
        &self,
        _: &CallContext,
        _: &[ChildExecutionInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        unreachable!("purge never writes")
    }

    fn select_from_child_execution_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
    ) -> Result<Vec<ChildExecutionInfoMapsRow>, MapStoreError> {
        Ok(Vec::new())
    }

    fn delete_from_child_execution_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
        keys: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete(MapKind::ChildExecutionInfo, keys)
    }

    fn replace_into_request_cancel_info_maps(
        &self,
        _: &CallContext,
        _: &[RequestCancelInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        unreachable!("purge never writes")
    }

    fn select_from_request_cancel_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
    ) -> Result<Vec<RequestCancelInfoMapsRow>, MapStoreError> {
        Ok(Vec::new())
    }

    fn delete_from_request_cancel_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
        keys: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete(MapKind::RequestCancelInfo, keys)
    }

    fn replace_into_signal_info_maps(
        &self,
        _: &CallContext,
        _: &[SignalInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError> {
        unreachable!("purge never writes")
    }

    fn select_from_signal_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
    ) -> Result<Vec<SignalInfoMapsRow>, MapStoreError> {
        Ok(Vec::new())
    }

    fn delete_from_signal_info_maps(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
        keys: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete(MapKind::SignalInfo, keys)
    }

    fn insert_into_signals_requested_sets(
        &self,
        _: &CallContext,
        _: &[SignalsRequestedSetsRow],
    ) -> Result<ExecResult, MapStoreError> {
        unreachable!("purge never writes")
    }

    fn select_from_signals_requested_sets(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
    ) -> Result<Vec<SignalsRequestedSetsRow>, MapStoreError> {
        Ok(Vec::new())
    }

    fn delete_from_signals_requested_sets(
        &self,
        _: &CallContext,
        _: &ExecutionFilter,
        keys: &KeySet<String>,
    ) -> Result<ExecResult, MapStoreError> {
        self.delete(MapKind::SignalsRequested, keys)
    }
}

fn filter() -> ExecutionFilter {
    ExecutionFilter::new(ShardId::new(3), "domain", "workflow", "run")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn purge_visits_every_kind_in_order() {
    let store = RecordingStore::default();
    let report = purge_execution_maps(&store, &CallContext::background(), &filter()).unwrap();
    assert_eq!(store.recorded(), MapKind::ALL.to_vec());
    assert_eq!(report.removed(MapKind::ActivityInfo), 1);
    assert_eq!(report.removed(MapKind::SignalsRequested), 6);
    assert_eq!(report.total(), 21);
    assert_eq!(report.iter().count(), 6);
}

#[test]
fn purge_stops_at_first_failure() {
    let store = RecordingStore {
        fail_on: Some(MapKind::ChildExecutionInfo),
        ..RecordingStore::default()
    };
    let err = purge_execution_maps(&store, &CallContext::background(), &filter()).unwrap_err();
    assert!(matches!(err, MapStoreError::Backend(message) if message.contains("child")));
    assert_eq!(store.recorded(), vec![MapKind::ActivityInfo, MapKind::TimerInfo]);
}

#[test]
fn purge_works_through_trait_objects() {
    let store = RecordingStore::default();
    let dyn_store: &dyn ExecutionMapStore = &store;
    purge_execution_maps(dyn_store, &CallContext::background(), &filter()).unwrap();
    assert_eq!(store.recorded().len(), 6);
}
