// crates/shardline-core/tests/templates.rs
// ============================================================================
// Module: Statement Template Tests
// Description: Shape tests for generated map statements.
// Purpose: Pin placeholder counts, ordinals, and conflict clauses per kind.
// ============================================================================

//! ## Overview
//! Templates are generated from static schema descriptors. These tests pin
//! the rendered text for representative kinds and check the placeholder
//! arithmetic for every kind in both dialects.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use proptest::prelude::*;
use shardline_core::MapKind;
use shardline_core::MapStoreError;
use shardline_core::PostgresDialect;
use shardline_core::SchemaRegistry;
use shardline_core::SqliteDialect;
use shardline_core::query::dialect::SQLITE_MAX_BIND_PARAMETERS;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn sqlite_registry() -> SchemaRegistry {
    SchemaRegistry::new(Arc::new(SqliteDialect)).expect("sqlite registry")
}

fn postgres_registry() -> SchemaRegistry {
    SchemaRegistry::new(Arc::new(PostgresDialect)).expect("postgres registry")
}

fn count_occurrences(haystack: &str, needle: char) -> usize {
    haystack.chars().filter(|c| *c == needle).count()
}

// ============================================================================
// SECTION: Rendered Text
// ============================================================================

#[test]
fn timer_upsert_renders_postgres_placeholders_in_row_order() {
    let registry = postgres_registry();
    let sql = registry.get(MapKind::TimerInfo).upsert_statement(2).unwrap();
    assert_eq!(
        sql,
        "INSERT INTO timer_info_maps (shard_id, domain_id, workflow_id, run_id, timer_id, data, \
         data_encoding) VALUES ($1, $2, $3, $4, $5, $6, $7), ($8, $9, $10, $11, $12, \
         $13, $14) ON CONFLICT (shard_id, domain_id, workflow_id, run_id, timer_id) DO UPDATE \
         SET data = excluded.data, data_encoding = excluded.data_encoding"
    );
}

#[test]
fn signals_requested_upsert_keeps_existing_rows() {
    let registry = sqlite_registry();
    let sql = registry.get(MapKind::SignalsRequested).upsert_statement(1).unwrap();
    assert!(sql.ends_with(
        "ON CONFLICT (shard_id, domain_id, workflow_id, run_id, signal_id) DO NOTHING"
    ));
    assert!(!sql.contains("DO UPDATE"));
}

#[test]
fn activity_select_lists_key_then_values() {
    let registry = sqlite_registry();
    assert_eq!(
        registry.get(MapKind::ActivityInfo).select_all(),
        "SELECT schedule_id, data, data_encoding, last_heartbeat_details, \
         last_heartbeat_updated_time FROM activity_info_maps WHERE shard_id = ?1 AND domain_id = \
         ?2 AND workflow_id = ?3 AND run_id = ?4"
    );
}

#[test]
fn delete_with_keys_binds_keys_after_identity() {
    let registry = postgres_registry();
    let sql = registry.get(MapKind::SignalInfo).delete_keys_statement(3).unwrap();
    assert_eq!(
        sql,
        "DELETE FROM signal_info_maps WHERE shard_id = $1 AND domain_id = $2 AND workflow_id = \
         $3 AND run_id = $4 AND initiated_id IN ($5, $6, $7)"
    );
}

#[test]
fn delete_all_has_no_key_predicate() {
    let registry = sqlite_registry();
    for templates in registry.iter() {
        let sql = templates.delete_all();
        assert!(sql.starts_with(&format!("DELETE FROM {} WHERE", templates.schema().table)));
        assert!(!sql.contains(" IN ("));
        assert_eq!(count_occurrences(sql, '?'), 4);
    }
}

// ============================================================================
// SECTION: Expansion Limits
// ============================================================================

#[test]
fn empty_expansions_are_rejected() {
    let registry = sqlite_registry();
    for kind in MapKind::ALL {
        let templates = registry.get(kind);
        assert!(matches!(templates.upsert_statement(0), Err(MapStoreError::ParameterExpansion(_))));
        assert!(matches!(
            templates.delete_keys_statement(0),
            Err(MapStoreError::ParameterExpansion(_))
        ));
    }
}

#[test]
fn oversized_batches_fail_before_rendering() {
    let registry = sqlite_registry();
    let templates = registry.get(MapKind::ActivityInfo);
    let per_row = templates.schema().columns_per_row();
    let max_rows = SQLITE_MAX_BIND_PARAMETERS / per_row;
    assert!(templates.upsert_statement(max_rows).is_ok());
    assert!(matches!(
        templates.upsert_statement(max_rows + 1),
        Err(MapStoreError::ParameterExpansion(_))
    ));
    assert!(templates.upsert_statement(usize::MAX).is_err());
    assert!(templates.delete_keys_statement(SQLITE_MAX_BIND_PARAMETERS - 4).is_ok());
    assert!(templates.delete_keys_statement(SQLITE_MAX_BIND_PARAMETERS - 3).is_err());
}

#[test]
fn registry_covers_every_kind_in_order() {
    let registry = sqlite_registry();
    let kinds = registry.iter().map(|templates| templates.kind()).collect::<Vec<_>>();
    assert_eq!(kinds, MapKind::ALL.to_vec());
    assert_eq!(registry.dialect().name(), "sqlite");
}

proptest! {
    #[test]
    fn upsert_placeholder_count_matches_rows(row_count in 1usize .. 64, kind_index in 0usize .. 6) {
        let registry = postgres_registry();
        let kind = MapKind::ALL[kind_index];
        let templates = registry.get(kind);
        let sql = templates.upsert_statement(row_count).unwrap();
        let expected = row_count * templates.schema().columns_per_row();
        prop_assert_eq!(count_occurrences(&sql, '$'), expected);
        let last = format!("${expected})");
        prop_assert!(sql.contains(&last));
        let past = format!("${}", expected + 1);
        prop_assert!(!sql.contains(&past));
    }

    #[test]
    fn delete_placeholder_count_matches_keys(key_count in 1usize .. 256, kind_index in 0usize .. 6) {
        let registry = sqlite_registry();
        let sql = registry.get(MapKind::ALL[kind_index]).delete_keys_statement(key_count).unwrap();
        prop_assert_eq!(count_occurrences(&sql, '?'), 4 + key_count);
    }
}
