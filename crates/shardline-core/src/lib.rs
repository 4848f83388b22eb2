// crates/shardline-core/src/lib.rs
// ============================================================================
// Module: Shardline Core Library
// Description: Public API surface for the Shardline execution-map core.
// Purpose: Expose routing, schema, query, and store interface types.
// Dependencies: crate::{core, query, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Shardline core holds everything about execution maps that does not depend
//! on a particular relational backend: identity types, the shard router, the
//! static schema registry for the six map kinds, dialect-aware statement
//! templates, and the [`ExecutionMapStore`] contract that backends implement.
//! Backends bind these templates to a driver; they never build SQL text of
//! their own.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod query;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::ExecResult;
pub use interfaces::ExecutionMapStore;
pub use interfaces::KeySet;
pub use interfaces::MapStoreError;
pub use query::MapTemplates;
pub use query::PostgresDialect;
pub use query::SchemaRegistry;
pub use query::SqlDialect;
pub use query::SqliteDialect;
pub use runtime::PurgeReport;
pub use runtime::RegistrationSink;
pub use runtime::ScannerRegistry;
pub use runtime::purge_execution_maps;
