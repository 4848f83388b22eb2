// crates/shardline-core/tests/proptest_routing.rs
// ============================================================================
// Module: Shard Routing Property-Based Tests
// Description: Property tests for logical to physical shard resolution.
// Purpose: Check range, determinism, and modulo semantics over wide inputs.
// ============================================================================

//! Property-based tests for shard router invariants.

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

use std::num::NonZeroU32;

use proptest::prelude::*;
use shardline_core::ShardId;
use shardline_core::ShardRouter;
use shardline_core::core::routing::resolve_db_shard;

proptest! {
    #[test]
    fn resolved_shard_is_always_in_range(shard in any::<u32>(), total in 1u32 ..= 4096) {
        let total = NonZeroU32::new(total).unwrap();
        let resolved = ShardRouter::new(total).resolve(ShardId::new(shard));
        prop_assert!(resolved.get() < total.get());
    }

    #[test]
    fn resolution_is_plain_modulo(shard in any::<u32>(), total in 1u32 ..= u32::MAX) {
        let total = NonZeroU32::new(total).unwrap();
        prop_assert_eq!(resolve_db_shard(ShardId::new(shard), total).get(), shard % total.get());
    }

    #[test]
    fn resolution_is_deterministic(shard in any::<u32>(), total in 1u32 ..= 64) {
        let router = ShardRouter::new(NonZeroU32::new(total).unwrap());
        prop_assert_eq!(router.resolve(ShardId::new(shard)), router.resolve(ShardId::new(shard)));
    }
}

#[test]
fn single_router_sends_everything_to_partition_zero() {
    let router = ShardRouter::single();
    for shard in [0, 1, 7, u32::MAX] {
        assert_eq!(router.resolve(ShardId::new(shard)).get(), 0);
    }
}

#[test]
fn routes_by_remainder() {
    let router = ShardRouter::new(NonZeroU32::new(4).unwrap());
    assert_eq!(router.resolve(ShardId::new(10)).get(), 2);
    assert_eq!(router.resolve(ShardId::new(3)).get(), 3);
    assert_eq!(router.resolve(ShardId::new(4)).get(), 0);
    assert_eq!(router.db_shards().map(|shard| shard.get()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}
