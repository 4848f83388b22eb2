// crates/shardline-core/src/interfaces/mod.rs
// ============================================================================
// Module: Shardline Interfaces
// Description: Backend-agnostic execution map store contract and errors.
// Purpose: Define the surface the workflow engine uses to persist maps.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! [`ExecutionMapStore`] is the contract between the execution processor and
//! a relational backend. Every operation is one statement against one
//! physical shard: no retries, no suppression, no multi-statement
//! transactions. Backend failures surface as [`MapStoreError::Backend`] with
//! the driver's message preserved.
//!
//! Key-set policy for deletes: [`KeySet::All`] deletes every row of the
//! execution; [`KeySet::Only`] with an empty list is a no-op that issues no
//! statement. The policy is the same for every map kind.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ActivityInfoMapsRow;
use crate::core::ChildExecutionInfoMapsRow;
use crate::core::DbShardId;
use crate::core::ExecutionFilter;
use crate::core::RequestCancelInfoMapsRow;
use crate::core::SignalInfoMapsRow;
use crate::core::SignalsRequestedSetsRow;
use crate::core::TimerInfoMapsRow;
use crate::core::context::CallContext;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Execution map store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed row payload bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapStoreError {
    /// Relational driver failure, message preserved verbatim.
    #[error("map store backend error: {0}")]
    Backend(String),
    /// Variadic parameter expansion failed; nothing was executed.
    #[error("map store parameter expansion error: {0}")]
    ParameterExpansion(String),
    /// Rows of one batch route to different physical shards.
    #[error("map store batch spans shards: expected db shard {expected}, found {found}")]
    MixedShardBatch {
        /// Physical shard of the first row.
        expected: DbShardId,
        /// Physical shard of the first mismatching row.
        found: DbShardId,
    },
    /// The call context was cancelled.
    #[error("map store operation cancelled")]
    Cancelled,
    /// The call context deadline passed.
    #[error("map store operation deadline exceeded")]
    DeadlineExceeded,
    /// Data cannot be represented in storage.
    #[error("map store invalid data: {0}")]
    Invalid(String),
    /// Store setup or local I/O failure.
    #[error("map store io error: {0}")]
    Io(String),
    /// Stored schema version is not supported.
    #[error("map store version mismatch: {0}")]
    VersionMismatch(String),
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of a mutating map statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Rows reported changed by the backend.
    pub rows_affected: u64,
}

impl ExecResult {
    /// Creates a result from a backend affected-row count.
    #[must_use]
    pub const fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
        }
    }
}

/// Key selection for map deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySet<K> {
    /// Every row of the execution.
    All,
    /// Only rows whose map key is listed; an empty list selects nothing.
    Only(Vec<K>),
}

impl<K> KeySet<K> {
    /// Selects the listed keys.
    #[must_use]
    pub fn only(keys: impl IntoIterator<Item = K>) -> Self {
        Self::Only(keys.into_iter().collect())
    }

    /// Returns true when the selection cannot match any row.
    #[must_use]
    pub fn is_empty_selection(&self) -> bool {
        matches!(self, Self::Only(keys) if keys.is_empty())
    }
}

// ============================================================================
// SECTION: Store Contract
// ============================================================================

/// Persistence for per-execution maps, one statement per call.
///
/// # Invariants
/// - Replace with no rows returns `ExecResult::default()` without I/O.
/// - Rows returned by selects carry the filter's identity, not stored echoes.
/// - Result order from selects is unspecified.
pub trait ExecutionMapStore {
    /// Upserts activity info rows.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when routing, encoding, or execution fails.
    fn replace_into_activity_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[ActivityInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError>;

    /// Reads every activity info row of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when the query or decoding fails.
    fn select_from_activity_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ActivityInfoMapsRow>, MapStoreError>;

    /// Deletes activity info rows by schedule id.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when expansion or execution fails.
    fn delete_from_activity_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        schedule_ids: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError>;

    /// Upserts timer info rows.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when routing or execution fails.
    fn replace_into_timer_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[TimerInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError>;

    /// Reads every timer info row of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when the query or decoding fails.
    fn select_from_timer_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<TimerInfoMapsRow>, MapStoreError>;

    /// Deletes timer info rows by timer id.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when expansion or execution fails.
    fn delete_from_timer_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        timer_ids: &KeySet<String>,
    ) -> Result<ExecResult, MapStoreError>;

    /// Upserts child execution info rows.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when routing or execution fails.
    fn replace_into_child_execution_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[ChildExecutionInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError>;

    /// Reads every child execution info row of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when the query or decoding fails.
    fn select_from_child_execution_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ChildExecutionInfoMapsRow>, MapStoreError>;

    /// Deletes child execution info rows by initiated id.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when expansion or execution fails.
    fn delete_from_child_execution_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        initiated_ids: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError>;

    /// Upserts request cancel info rows.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when routing or execution fails.
    fn replace_into_request_cancel_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[RequestCancelInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError>;

    /// Reads every request cancel info row of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when the query or decoding fails.
    fn select_from_request_cancel_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<RequestCancelInfoMapsRow>, MapStoreError>;

    /// Deletes request cancel info rows by initiated id.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when expansion or execution fails.
    fn delete_from_request_cancel_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        initiated_ids: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError>;

    /// Upserts signal info rows.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when routing or execution fails.
    fn replace_into_signal_info_maps(
        &self,
        ctx: &CallContext,
        rows: &[SignalInfoMapsRow],
    ) -> Result<ExecResult, MapStoreError>;

    /// Reads every signal info row of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when the query or decoding fails.
    fn select_from_signal_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<SignalInfoMapsRow>, MapStoreError>;

    /// Deletes signal info rows by initiated id.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when expansion or execution fails.
    fn delete_from_signal_info_maps(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        initiated_ids: &KeySet<i64>,
    ) -> Result<ExecResult, MapStoreError>;

    /// Records delivered signal ids; ids already present are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when routing or execution fails.
    fn insert_into_signals_requested_sets(
        &self,
        ctx: &CallContext,
        rows: &[SignalsRequestedSetsRow],
    ) -> Result<ExecResult, MapStoreError>;

    /// Reads every delivered signal id of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when the query or decoding fails.
    fn select_from_signals_requested_sets(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
    ) -> Result<Vec<SignalsRequestedSetsRow>, MapStoreError>;

    /// Deletes delivered signal ids.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when expansion or execution fails.
    fn delete_from_signals_requested_sets(
        &self,
        ctx: &CallContext,
        filter: &ExecutionFilter,
        signal_ids: &KeySet<String>,
    ) -> Result<ExecResult, MapStoreError>;
}
