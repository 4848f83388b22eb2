// crates/shardline-core/src/core/mod.rs
// ============================================================================
// Module: Shardline Core Types
// Description: Identity, routing, schema, row, and call-context types.
// Purpose: Provide the stable value types shared by every map backend.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Core types describe what an execution map row is and where it lives. They
//! carry no backend state and are safe to share across threads.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod context;
pub mod identifiers;
pub mod routing;
pub mod rows;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::CallContext;
pub use context::CancelHandle;
pub use identifiers::DbShardId;
pub use identifiers::DomainId;
pub use identifiers::ExecutionFilter;
pub use identifiers::RunId;
pub use identifiers::ShardId;
pub use identifiers::WorkflowId;
pub use routing::ShardRouter;
pub use rows::ActivityInfoMapsRow;
pub use rows::ChildExecutionInfoMapsRow;
pub use rows::MapPayload;
pub use rows::RequestCancelInfoMapsRow;
pub use rows::SignalInfoMapsRow;
pub use rows::SignalsRequestedSetsRow;
pub use rows::TimerInfoMapsRow;
pub use schema::ConflictPolicy;
pub use schema::EXECUTION_COLUMNS;
pub use schema::MapKind;
pub use schema::MapSchema;
