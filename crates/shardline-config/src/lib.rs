// crates/shardline-config/src/lib.rs
// ============================================================================
// Module: Shardline Config Library
// Description: Configuration loading and logging initialization.
// Purpose: Turn a TOML file into validated store and logging settings.
// Dependencies: shardline-core, shardline-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! [`ShardlineConfig::load`] reads `shardline.toml` with strict path, size,
//! and encoding limits and fails closed on anything invalid.
//! [`init_tracing`] installs the process-wide `tracing` subscriber described
//! by the `[logging]` section.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod logging;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::LogFormat;
pub use config::LoggingConfig;
pub use config::PersistenceConfig;
pub use config::ShardlineConfig;
pub use config::SqlitePersistenceConfig;
pub use logging::init_tracing;
pub use logging::parse_filter;
