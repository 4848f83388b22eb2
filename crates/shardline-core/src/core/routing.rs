// crates/shardline-core/src/core/routing.rs
// ============================================================================
// Module: Shardline Shard Router
// Description: Deterministic mapping from logical shards to physical shards.
// Purpose: Pick the database partition that owns a workflow execution.
// Dependencies: crate::core::identifiers
// ============================================================================

//! ## Overview
//! Every map operation resolves its physical shard before touching the
//! backend. Routing is a pure modulo over the configured physical shard
//! count, so the same logical shard always lands on the same partition for
//! a given deployment.
//!
//! Operational invariant: changing the physical shard count re-routes
//! existing executions. That requires a data migration and is not guarded
//! at runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroU32;

use crate::core::identifiers::DbShardId;
use crate::core::identifiers::ShardId;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Resolves the physical shard owning a logical shard.
#[must_use]
pub const fn resolve_db_shard(shard_id: ShardId, total_db_shards: NonZeroU32) -> DbShardId {
    DbShardId::new(shard_id.get() % total_db_shards.get())
}

/// Shard router bound to a fixed physical shard count.
///
/// # Invariants
/// - `total_db_shards` is fixed for the router lifetime.
/// - Every resolved [`DbShardId`] is lower than `total_db_shards`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRouter {
    /// Number of physical database shards.
    total_db_shards: NonZeroU32,
}

impl ShardRouter {
    /// Creates a router over `total_db_shards` physical shards.
    #[must_use]
    pub const fn new(total_db_shards: NonZeroU32) -> Self {
        Self {
            total_db_shards,
        }
    }

    /// Creates a router that sends every logical shard to partition zero.
    #[must_use]
    pub const fn single() -> Self {
        Self {
            total_db_shards: NonZeroU32::MIN,
        }
    }

    /// Returns the configured physical shard count.
    #[must_use]
    pub const fn total_db_shards(&self) -> NonZeroU32 {
        self.total_db_shards
    }

    /// Resolves the physical shard for a logical shard.
    #[must_use]
    pub const fn resolve(&self, shard_id: ShardId) -> DbShardId {
        resolve_db_shard(shard_id, self.total_db_shards)
    }

    /// Iterates every physical shard index owned by this router.
    pub fn db_shards(&self) -> impl Iterator<Item = DbShardId> {
        (0 .. self.total_db_shards.get()).map(DbShardId::new)
    }
}
