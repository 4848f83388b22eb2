// crates/shardline-core/src/core/schema.rs
// ============================================================================
// Module: Shardline Map Schemas
// Description: Declarative table descriptors for the six execution map kinds.
// Purpose: Single source of truth for map table and column names.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each execution map kind is one table keyed by the execution identity plus
//! a kind-specific map key. The descriptors here are `'static` data: query
//! templates are derived from them once and no descriptor is ever built or
//! mutated per call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Identity columns shared by every map table, in bind order.
pub const EXECUTION_COLUMNS: [&str; 4] = ["shard_id", "domain_id", "workflow_id", "run_id"];

/// Value columns for activity info maps.
const ACTIVITY_INFO_COLUMNS: &[&str] =
    &["data", "data_encoding", "last_heartbeat_details", "last_heartbeat_updated_time"];

/// Value columns shared by maps carrying only an encoded payload.
const PAYLOAD_COLUMNS: &[&str] = &["data", "data_encoding"];

/// Activity info map descriptor.
const ACTIVITY_INFO_SCHEMA: MapSchema = MapSchema {
    table: "activity_info_maps",
    key_column: "schedule_id",
    value_columns: ACTIVITY_INFO_COLUMNS,
    conflict: ConflictPolicy::Replace,
};

/// Timer info map descriptor.
const TIMER_INFO_SCHEMA: MapSchema = MapSchema {
    table: "timer_info_maps",
    key_column: "timer_id",
    value_columns: PAYLOAD_COLUMNS,
    conflict: ConflictPolicy::Replace,
};

/// Child execution info map descriptor.
const CHILD_EXECUTION_INFO_SCHEMA: MapSchema = MapSchema {
    table: "child_execution_info_maps",
    key_column: "initiated_id",
    value_columns: PAYLOAD_COLUMNS,
    conflict: ConflictPolicy::Replace,
};

/// Request cancel info map descriptor.
const REQUEST_CANCEL_INFO_SCHEMA: MapSchema = MapSchema {
    table: "request_cancel_info_maps",
    key_column: "initiated_id",
    value_columns: PAYLOAD_COLUMNS,
    conflict: ConflictPolicy::Replace,
};

/// Signal info map descriptor.
const SIGNAL_INFO_SCHEMA: MapSchema = MapSchema {
    table: "signal_info_maps",
    key_column: "initiated_id",
    value_columns: PAYLOAD_COLUMNS,
    conflict: ConflictPolicy::Replace,
};

/// Signals requested set descriptor.
const SIGNALS_REQUESTED_SCHEMA: MapSchema = MapSchema {
    table: "signals_requested_sets",
    key_column: "signal_id",
    value_columns: &[],
    conflict: ConflictPolicy::Ignore,
};

// ============================================================================
// SECTION: Types
// ============================================================================

/// How an insert resolves a primary-key collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Overwrite every value column with the incoming row.
    Replace,
    /// Keep the stored row untouched.
    Ignore,
}

/// Declarative descriptor of one map table.
///
/// # Invariants
/// - `value_columns` excludes identity and key columns and is ordered as bound.
/// - A schema with [`ConflictPolicy::Replace`] has at least one value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapSchema {
    /// Table name.
    pub table: &'static str,
    /// Map key column name.
    pub key_column: &'static str,
    /// Value column names in bind order.
    pub value_columns: &'static [&'static str],
    /// Primary-key conflict handling.
    pub conflict: ConflictPolicy,
}

impl MapSchema {
    /// Returns the primary-key columns (identity followed by the map key).
    #[must_use]
    pub fn key_columns(&self) -> [&'static str; 5] {
        let [shard, domain, workflow, run] = EXECUTION_COLUMNS;
        [shard, domain, workflow, run, self.key_column]
    }

    /// Returns every column in insert order.
    pub fn insert_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.key_columns().into_iter().chain(self.value_columns.iter().copied())
    }

    /// Returns the number of bound parameters per inserted row.
    #[must_use]
    pub const fn columns_per_row(&self) -> usize {
        EXECUTION_COLUMNS.len() + 1 + self.value_columns.len()
    }
}

/// The six execution map kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    /// Pending activity state keyed by schedule id.
    ActivityInfo,
    /// User timers keyed by timer id.
    TimerInfo,
    /// In-flight child executions keyed by initiated id.
    ChildExecutionInfo,
    /// Pending external cancellation requests keyed by initiated id.
    RequestCancelInfo,
    /// Pending external signals keyed by initiated id.
    SignalInfo,
    /// Delivered signal request ids.
    SignalsRequested,
}

impl MapKind {
    /// Every map kind, in the order bulk operations visit them.
    pub const ALL: [Self; 6] = [
        Self::ActivityInfo,
        Self::TimerInfo,
        Self::ChildExecutionInfo,
        Self::RequestCancelInfo,
        Self::SignalInfo,
        Self::SignalsRequested,
    ];

    /// Returns the static table descriptor for this kind.
    #[must_use]
    pub const fn schema(self) -> &'static MapSchema {
        match self {
            Self::ActivityInfo => &ACTIVITY_INFO_SCHEMA,
            Self::TimerInfo => &TIMER_INFO_SCHEMA,
            Self::ChildExecutionInfo => &CHILD_EXECUTION_INFO_SCHEMA,
            Self::RequestCancelInfo => &REQUEST_CANCEL_INFO_SCHEMA,
            Self::SignalInfo => &SIGNAL_INFO_SCHEMA,
            Self::SignalsRequested => &SIGNALS_REQUESTED_SCHEMA,
        }
    }

    /// Returns the position of this kind inside [`MapKind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::ActivityInfo => 0,
            Self::TimerInfo => 1,
            Self::ChildExecutionInfo => 2,
            Self::RequestCancelInfo => 3,
            Self::SignalInfo => 4,
            Self::SignalsRequested => 5,
        }
    }

    /// Returns a stable label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ActivityInfo => "activity_info",
            Self::TimerInfo => "timer_info",
            Self::ChildExecutionInfo => "child_execution_info",
            Self::RequestCancelInfo => "request_cancel_info",
            Self::SignalInfo => "signal_info",
            Self::SignalsRequested => "signals_requested",
        }
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
