// crates/shardline-core/src/query/templates.rs
// ============================================================================
// Module: Shardline Map Statement Templates
// Description: Upsert, select-all, delete-by-keys, and delete-all statements.
// Purpose: Generate every map statement from a schema descriptor.
// Dependencies: crate::{core, interfaces, query::dialect}
// ============================================================================

//! ## Overview
//! [`MapTemplates::build`] renders the fixed parts of the four statement
//! shapes once. Only the two variadic shapes (multi-row upsert and keyed
//! delete) are completed per call, and only with placeholders: bound values
//! never enter statement text.
//!
//! Parameter order is identical for every statement: the four identity
//! columns first, then either the map keys (delete) or one column group per
//! row (upsert).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::EXECUTION_COLUMNS;
use crate::core::schema::ConflictPolicy;
use crate::core::schema::MapKind;
use crate::core::schema::MapSchema;
use crate::interfaces::MapStoreError;
use crate::query::dialect::SqlDialect;
use crate::query::dialect::validate_identifier;

// ============================================================================
// SECTION: Templates
// ============================================================================

/// Pre-rendered statements for one map kind.
///
/// # Invariants
/// - Built once per kind; immutable afterwards.
/// - Identifier text comes only from the static [`MapSchema`].
#[derive(Debug, Clone)]
pub struct MapTemplates {
    /// Map kind the templates belong to.
    kind: MapKind,
    /// Dialect used for variadic expansion.
    dialect: Arc<dyn SqlDialect>,
    /// `INSERT INTO t (columns) VALUES ` prefix.
    upsert_head: String,
    /// ` ON CONFLICT ...` suffix.
    upsert_tail: String,
    /// Select-all statement.
    select_all: String,
    /// Delete-all statement.
    delete_all: String,
    /// Delete-by-keys prefix ending in `IN (`.
    delete_keys_head: String,
}

impl MapTemplates {
    /// Renders the statement templates for `kind` in `dialect`.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError::Invalid`] when a schema identifier is not a
    /// plain SQL identifier or a replace schema has no value columns.
    pub fn build(kind: MapKind, dialect: Arc<dyn SqlDialect>) -> Result<Self, MapStoreError> {
        let schema = kind.schema();
        validate_schema(schema)?;

        let columns = schema.insert_columns().collect::<Vec<_>>().join(", ");
        let upsert_head = format!("INSERT INTO {} ({columns}) VALUES ", schema.table);
        let upsert_tail = render_conflict_clause(schema);

        let identity = identity_predicate(dialect.as_ref());
        let mut selected = vec![schema.key_column];
        selected.extend_from_slice(schema.value_columns);
        let select_all =
            format!("SELECT {} FROM {} WHERE {identity}", selected.join(", "), schema.table);
        let delete_all = format!("DELETE FROM {} WHERE {identity}", schema.table);
        let delete_keys_head =
            format!("DELETE FROM {} WHERE {identity} AND {} IN (", schema.table, schema.key_column);

        Ok(Self {
            kind,
            dialect,
            upsert_head,
            upsert_tail,
            select_all,
            delete_all,
            delete_keys_head,
        })
    }

    /// Returns the map kind.
    #[must_use]
    pub const fn kind(&self) -> MapKind {
        self.kind
    }

    /// Returns the schema descriptor.
    #[must_use]
    pub const fn schema(&self) -> &'static MapSchema {
        self.kind.schema()
    }

    /// Returns the select-all statement (binds the four identity columns).
    #[must_use]
    pub fn select_all(&self) -> &str {
        &self.select_all
    }

    /// Returns the delete-all statement (binds the four identity columns).
    #[must_use]
    pub fn delete_all(&self) -> &str {
        &self.delete_all
    }

    /// Renders an upsert covering `row_count` rows in one statement.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError::ParameterExpansion`] when `row_count` is zero
    /// or the batch exceeds the dialect's parameter limit.
    pub fn upsert_statement(&self, row_count: usize) -> Result<String, MapStoreError> {
        let per_row = self.schema().columns_per_row();
        let total = row_count.checked_mul(per_row).ok_or_else(|| {
            MapStoreError::ParameterExpansion(format!("{row_count} rows overflow parameter count"))
        })?;
        // Validates the whole range up front so no partial text is built.
        self.dialect.bind_list(1, total)?;
        let mut sql = String::with_capacity(
            self.upsert_head.len() + self.upsert_tail.len() + total * 5 + row_count * 4,
        );
        sql.push_str(&self.upsert_head);
        for row in 0 .. row_count {
            if row > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            sql.push_str(&self.dialect.bind_list(row * per_row + 1, per_row)?);
            sql.push(')');
        }
        sql.push_str(&self.upsert_tail);
        Ok(sql)
    }

    /// Renders a delete restricted to `key_count` map keys.
    ///
    /// Keys bind after the identity columns, starting at ordinal 5.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError::ParameterExpansion`] when `key_count` is zero
    /// or exceeds the dialect's parameter limit.
    pub fn delete_keys_statement(&self, key_count: usize) -> Result<String, MapStoreError> {
        let keys = self.dialect.bind_list(EXECUTION_COLUMNS.len() + 1, key_count)?;
        let mut sql = String::with_capacity(self.delete_keys_head.len() + keys.len() + 1);
        sql.push_str(&self.delete_keys_head);
        sql.push_str(&keys);
        sql.push(')');
        Ok(sql)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates every identifier and the conflict shape of a schema.
fn validate_schema(schema: &MapSchema) -> Result<(), MapStoreError> {
    validate_identifier(schema.table)?;
    for column in schema.insert_columns() {
        validate_identifier(column)?;
    }
    if schema.conflict == ConflictPolicy::Replace && schema.value_columns.is_empty() {
        return Err(MapStoreError::Invalid(format!(
            "replace schema {} must declare value columns",
            schema.table
        )));
    }
    Ok(())
}

/// Renders `shard_id = p1 AND domain_id = p2 AND ...` over the identity columns.
fn identity_predicate(dialect: &dyn SqlDialect) -> String {
    EXECUTION_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{column} = {}", dialect.placeholder(index + 1)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Renders the `ON CONFLICT` clause for a schema.
fn render_conflict_clause(schema: &MapSchema) -> String {
    let target = schema.key_columns().join(", ");
    match schema.conflict {
        ConflictPolicy::Ignore => format!(" ON CONFLICT ({target}) DO NOTHING"),
        ConflictPolicy::Replace => {
            let assignments = schema
                .value_columns
                .iter()
                .map(|column| format!("{column} = excluded.{column}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" ON CONFLICT ({target}) DO UPDATE SET {assignments}")
        }
    }
}
