// crates/shardline-core/src/core/identifiers.rs
// ============================================================================
// Module: Shardline Identifiers
// Description: Shard and execution identity types for execution maps.
// Purpose: Provide strongly typed identifiers with stable storage forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A workflow execution is addressed by the 4-tuple of logical shard, domain,
//! workflow, and run. Logical shards are routed to physical database shards
//! by [`crate::ShardRouter`]; the two shard identifiers are distinct types so
//! they cannot be confused at call sites.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Shard Identifiers
// ============================================================================

/// Logical (history) shard identifier owning a workflow execution.
///
/// # Invariants
/// - Stable for the lifetime of the execution; rows never move between shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(u32);

impl ShardId {
    /// Creates a logical shard identifier.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw shard value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the value in the column representation used by map tables.
    #[must_use]
    pub fn as_column(self) -> i64 {
        i64::from(self.0)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Physical database shard index.
///
/// # Invariants
/// - Always lower than the total shard count of the router that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DbShardId(u32);

impl DbShardId {
    /// Creates a physical shard index.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw shard index.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the index for slice addressing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DbShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Execution Identifiers
// ============================================================================

/// Domain identifier owning a workflow.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    /// Creates a new domain identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DomainId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Workflow identifier within a domain.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Creates a new workflow identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WorkflowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Run identifier for a single execution of a workflow.
///
/// # Invariants
/// - Opaque UTF-8 string; never reused for a different execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Creates a new run identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Execution Filter
// ============================================================================

/// Identity of one workflow execution; also the filter for map reads/deletes.
///
/// # Invariants
/// - The 4-tuple uniquely identifies one run and is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionFilter {
    /// Logical shard owning the execution.
    pub shard_id: ShardId,
    /// Domain identifier.
    pub domain_id: DomainId,
    /// Workflow identifier.
    pub workflow_id: WorkflowId,
    /// Run identifier.
    pub run_id: RunId,
}

impl ExecutionFilter {
    /// Creates an execution filter from its identity parts.
    #[must_use]
    pub fn new(
        shard_id: ShardId,
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            shard_id,
            domain_id: DomainId::new(domain_id),
            workflow_id: WorkflowId::new(workflow_id),
            run_id: RunId::new(run_id),
        }
    }
}

impl fmt::Display for ExecutionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.shard_id, self.domain_id, self.workflow_id, self.run_id)
    }
}
