// crates/shardline-config/src/logging.rs
// ============================================================================
// Module: Shardline Logging
// Description: Process-wide tracing subscriber setup.
// Purpose: Apply the `[logging]` section to the global subscriber.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! `RUST_LOG` overrides the configured filter when set. Installation is
//! idempotent: a second call leaves the first subscriber in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::ConfigError;
use crate::config::LogFormat;
use crate::config::LoggingConfig;

// ============================================================================
// SECTION: Initialization
// ============================================================================

/// Installs the global `tracing` subscriber.
///
/// Returns `false` when a subscriber was already installed.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the configured filter does not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);
    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    if installed {
        debug!(format = config.format.label(), "tracing subscriber installed");
    }
    Ok(installed)
}

/// Resolves the effective filter, preferring `RUST_LOG`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the configured filter does not parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    parse_filter(&config.filter)
}

/// Parses one filter directive string.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when a directive does not parse.
pub fn parse_filter(directives: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(directives.trim())
        .map_err(|err| ConfigError::Invalid(format!("logging.filter: {err}")))
}
