// crates/shardline-core/src/runtime/purge.rs
// ============================================================================
// Module: Shardline Execution Purge
// Description: Delete-all across every map kind of one execution.
// Purpose: Caller-driven cleanup when an execution is removed.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! [`purge_execution_maps`] issues one delete-all statement per map kind in
//! [`MapKind::ALL`] order. The first failure stops the purge and is returned
//! unchanged; kinds already purged stay purged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::debug;
use tracing::warn;

use crate::core::CallContext;
use crate::core::ExecutionFilter;
use crate::core::MapKind;
use crate::interfaces::ExecResult;
use crate::interfaces::ExecutionMapStore;
use crate::interfaces::KeySet;
use crate::interfaces::MapStoreError;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Rows removed per map kind by one purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurgeReport {
    /// Affected-row counts indexed by [`MapKind::index`].
    removed: [u64; 6],
}

impl PurgeReport {
    /// Returns the rows removed for one kind.
    #[must_use]
    pub const fn removed(&self, kind: MapKind) -> u64 {
        self.removed[kind.index()]
    }

    /// Returns the rows removed across every kind.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.removed.iter().sum()
    }

    /// Iterates `(kind, removed)` pairs in [`MapKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (MapKind, u64)> + '_ {
        MapKind::ALL.iter().map(|kind| (*kind, self.removed(*kind)))
    }

    /// Records the outcome of one kind's delete.
    const fn record(&mut self, kind: MapKind, result: ExecResult) {
        self.removed[kind.index()] = result.rows_affected;
    }
}

// ============================================================================
// SECTION: Purge
// ============================================================================

/// Deletes every map row belonging to `filter`'s execution.
///
/// # Errors
///
/// Returns the first [`MapStoreError`] raised by the store; later kinds are
/// not attempted.
pub fn purge_execution_maps<S>(
    store: &S,
    ctx: &CallContext,
    filter: &ExecutionFilter,
) -> Result<PurgeReport, MapStoreError>
where
    S: ExecutionMapStore + ?Sized,
{
    let mut report = PurgeReport::default();
    for kind in MapKind::ALL {
        let result = delete_all(store, ctx, filter, kind).inspect_err(|err| {
            warn!(execution = %filter, kind = %kind, error = %err, "execution purge stopped");
        })?;
        report.record(kind, result);
    }
    debug!(execution = %filter, removed = report.total(), "execution maps purged");
    Ok(report)
}

/// Dispatches a delete-all for one kind.
fn delete_all<S>(
    store: &S,
    ctx: &CallContext,
    filter: &ExecutionFilter,
    kind: MapKind,
) -> Result<ExecResult, MapStoreError>
where
    S: ExecutionMapStore + ?Sized,
{
    match kind {
        MapKind::ActivityInfo => store.delete_from_activity_info_maps(ctx, filter, &KeySet::All),
        MapKind::TimerInfo => store.delete_from_timer_info_maps(ctx, filter, &KeySet::All),
        MapKind::ChildExecutionInfo => {
            store.delete_from_child_execution_info_maps(ctx, filter, &KeySet::All)
        }
        MapKind::RequestCancelInfo => {
            store.delete_from_request_cancel_info_maps(ctx, filter, &KeySet::All)
        }
        MapKind::SignalInfo => store.delete_from_signal_info_maps(ctx, filter, &KeySet::All),
        MapKind::SignalsRequested => {
            store.delete_from_signals_requested_sets(ctx, filter, &KeySet::All)
        }
    }
}
