// crates/shardline-core/src/query/dialect.rs
// ============================================================================
// Module: Shardline SQL Dialects
// Description: Placeholder rendering and variadic binding per backend.
// Purpose: Keep statement templates backend-agnostic.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! A dialect answers three questions for the template generator: how a bound
//! parameter is spelled, how many parameters one statement may carry, and
//! whether a schema identifier is safe to splice into statement text.
//! Variable-length lists (`IN (...)` and multi-row `VALUES`) are expanded
//! through [`SqlDialect::bind_list`] so that every backend shares one
//! expansion routine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write;

use crate::interfaces::MapStoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Host parameter limit of bundled `SQLite` (`SQLITE_MAX_VARIABLE_NUMBER`).
pub const SQLITE_MAX_BIND_PARAMETERS: usize = 32_766;
/// Bind parameter limit of the Postgres wire protocol.
pub const POSTGRES_MAX_BIND_PARAMETERS: usize = 65_535;
/// Maximum accepted identifier length.
const MAX_IDENTIFIER_LENGTH: usize = 63;

// ============================================================================
// SECTION: Dialect Contract
// ============================================================================

/// Backend-specific statement spelling.
pub trait SqlDialect: fmt::Debug + Send + Sync {
    /// Returns a stable dialect label for logs.
    fn name(&self) -> &'static str;

    /// Renders the placeholder for a 1-based parameter ordinal.
    fn placeholder(&self, ordinal: usize) -> String;

    /// Returns the maximum number of parameters a single statement may bind.
    fn max_bind_parameters(&self) -> usize;

    /// Renders `count` comma-separated placeholders starting at `first_ordinal`.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError::ParameterExpansion`] when `count` is zero or
    /// the last ordinal would exceed [`SqlDialect::max_bind_parameters`].
    fn bind_list(&self, first_ordinal: usize, count: usize) -> Result<String, MapStoreError> {
        if count == 0 {
            return Err(MapStoreError::ParameterExpansion(
                "cannot expand an empty parameter list".to_string(),
            ));
        }
        let last = first_ordinal
            .checked_add(count - 1)
            .filter(|last| *last <= self.max_bind_parameters())
            .ok_or_else(|| {
                MapStoreError::ParameterExpansion(format!(
                    "{count} parameters from ordinal {first_ordinal} exceed the {} limit of {}",
                    self.name(),
                    self.max_bind_parameters()
                ))
            })?;
        let mut rendered = String::with_capacity(count * 4);
        for ordinal in first_ordinal ..= last {
            if ordinal > first_ordinal {
                rendered.push_str(", ");
            }
            rendered.push_str(&self.placeholder(ordinal));
        }
        Ok(rendered)
    }
}

// ============================================================================
// SECTION: Dialects
// ============================================================================

/// `SQLite` numbered parameters (`?1`, `?2`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, ordinal: usize) -> String {
        let mut out = String::with_capacity(6);
        let _ = write!(out, "?{ordinal}");
        out
    }

    fn max_bind_parameters(&self) -> usize {
        SQLITE_MAX_BIND_PARAMETERS
    }
}

/// Postgres positional parameters (`$1`, `$2`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, ordinal: usize) -> String {
        let mut out = String::with_capacity(6);
        let _ = write!(out, "${ordinal}");
        out
    }

    fn max_bind_parameters(&self) -> usize {
        POSTGRES_MAX_BIND_PARAMETERS
    }
}

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Validates that `name` is a plain lower-case SQL identifier.
///
/// # Errors
///
/// Returns [`MapStoreError::Invalid`] for empty, overlong, or non
/// `[a-z_][a-z0-9_]*` names.
pub fn validate_identifier(name: &str) -> Result<(), MapStoreError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(MapStoreError::Invalid("identifier must not be empty".to_string()));
    };
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MapStoreError::Invalid(format!("identifier too long: {name}")));
    }
    if !(first.is_ascii_lowercase() || first == '_')
        || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(MapStoreError::Invalid(format!("identifier not allowed: {name}")));
    }
    Ok(())
}
