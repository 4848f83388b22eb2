// crates/shardline-core/src/core/rows.rs
// ============================================================================
// Module: Shardline Map Rows
// Description: Row types for each execution map kind.
// Purpose: Carry opaque serialized snapshots between the engine and storage.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Rows pair an [`ExecutionFilter`] with a map key and an opaque payload. The
//! persistence layer never interprets payload bytes; `data_encoding` is a tag
//! owned by the caller's serializer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::ExecutionFilter;

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Opaque serialized snapshot stored in a map row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapPayload {
    /// Serialized bytes.
    pub data: Vec<u8>,
    /// Encoding tag describing `data`.
    pub data_encoding: String,
}

impl MapPayload {
    /// Creates a payload from bytes and an encoding tag.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, data_encoding: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            data_encoding: data_encoding.into(),
        }
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Row of `activity_info_maps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInfoMapsRow {
    /// Owning execution.
    pub execution: ExecutionFilter,
    /// Schedule event id of the activity.
    pub schedule_id: i64,
    /// Activity snapshot.
    pub payload: MapPayload,
    /// Details recorded with the last heartbeat.
    pub last_heartbeat_details: Vec<u8>,
    /// Time of the last heartbeat.
    pub last_heartbeat_updated_time: OffsetDateTime,
}

/// Row of `timer_info_maps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerInfoMapsRow {
    /// Owning execution.
    pub execution: ExecutionFilter,
    /// User-supplied timer id.
    pub timer_id: String,
    /// Timer snapshot.
    pub payload: MapPayload,
}

/// Row of `child_execution_info_maps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildExecutionInfoMapsRow {
    /// Owning execution.
    pub execution: ExecutionFilter,
    /// Initiated event id of the child workflow.
    pub initiated_id: i64,
    /// Child execution snapshot.
    pub payload: MapPayload,
}

/// Row of `request_cancel_info_maps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCancelInfoMapsRow {
    /// Owning execution.
    pub execution: ExecutionFilter,
    /// Initiated event id of the cancellation request.
    pub initiated_id: i64,
    /// Cancellation request snapshot.
    pub payload: MapPayload,
}

/// Row of `signal_info_maps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalInfoMapsRow {
    /// Owning execution.
    pub execution: ExecutionFilter,
    /// Initiated event id of the outgoing signal.
    pub initiated_id: i64,
    /// Signal snapshot.
    pub payload: MapPayload,
}

/// Row of `signals_requested_sets`; existence is the only state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalsRequestedSetsRow {
    /// Owning execution.
    pub execution: ExecutionFilter,
    /// Request id of a delivered signal.
    pub signal_id: String,
}
