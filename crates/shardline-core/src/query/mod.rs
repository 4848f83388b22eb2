// crates/shardline-core/src/query/mod.rs
// ============================================================================
// Module: Shardline Query Generation
// Description: Dialects, per-kind templates, and the schema registry.
// Purpose: Build every map statement once, at store construction.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The [`SchemaRegistry`] is the immutable object a backend is handed at
//! construction. It owns one [`MapTemplates`] per [`MapKind`] and is
//! read-only afterwards, so it can be shared freely across threads.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod dialect;
pub mod templates;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::core::MapKind;
use crate::interfaces::MapStoreError;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dialect::PostgresDialect;
pub use dialect::SqlDialect;
pub use dialect::SqliteDialect;
pub use templates::MapTemplates;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Templates for all six map kinds in one dialect.
///
/// # Invariants
/// - Contains exactly one entry per [`MapKind`], indexed by [`MapKind::index`].
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    /// Dialect the templates were rendered for.
    dialect: Arc<dyn SqlDialect>,
    /// Templates ordered as [`MapKind::ALL`].
    templates: [MapTemplates; 6],
}

impl SchemaRegistry {
    /// Renders templates for every map kind.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError`] when a schema descriptor is malformed.
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Result<Self, MapStoreError> {
        let built = MapKind::ALL
            .iter()
            .map(|kind| MapTemplates::build(*kind, Arc::clone(&dialect)))
            .collect::<Result<Vec<_>, _>>()?;
        let templates: [MapTemplates; 6] = built.try_into().map_err(|_| {
            MapStoreError::Invalid("schema registry must cover every map kind".to_string())
        })?;
        debug!(dialect = dialect.name(), "execution map templates built");
        Ok(Self {
            dialect,
            templates,
        })
    }

    /// Returns the dialect the templates were rendered for.
    #[must_use]
    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// Returns the templates for one map kind.
    #[must_use]
    pub const fn get(&self, kind: MapKind) -> &MapTemplates {
        &self.templates[kind.index()]
    }

    /// Iterates the templates in [`MapKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &MapTemplates> {
        self.templates.iter()
    }
}
