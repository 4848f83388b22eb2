// crates/shardline-store-sqlite/src/lib.rs
// ============================================================================
// Module: Shardline SQLite Store Library
// Description: SQLite-backed execution map store.
// Purpose: Expose the sharded SQLite store and its configuration.
// Dependencies: shardline-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate binds the statement templates of `shardline-core` to
//! `rusqlite`. Each physical shard is a separate database file holding the
//! six map tables; the store routes every call to exactly one of them.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod codec;
pub mod config;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::SqliteJournalMode;
pub use config::SqliteMapStoreConfig;
pub use config::SqliteSyncMode;
pub use store::SCHEMA_VERSION;
pub use store::SqliteExecutionMapStore;
