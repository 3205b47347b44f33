//! Determinism testing utilities.
//!
//! The core must issue identical orders given identical snapshots and seed.
//! Sources of non-determinism to watch for:
//!
//! - **HashMap iteration order**: registries iterate in insertion or id order.
//! - **System randomness**: every random pick uses the seeded `ChaCha8Rng`.
//! - **Wall clock**: only the round budget reads it; give tests a generous one.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tactics_core::config::TacticsConfig;
use tactics_core::orchestrator::TacticalContext;
use tactics_core::pathing::PathSearch;
use tactics_core::snapshot::Snapshot;

use crate::sink::RecordingSink;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical order logs.
    pub is_deterministic: bool,
    /// Order-log digest of each run.
    pub hashes: Vec<u64>,
    /// Rounds played per run.
    pub rounds: usize,
}

impl DeterminismResult {
    /// Assert that every run matched, with a detailed message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different order logs.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic,
            "Order log is non-deterministic!\nRuns: {}\nRounds: {}\nAll hashes: {:?}",
            self.hashes.len(),
            self.rounds,
            self.hashes
        );
    }
}

/// Digest of a sink's recorded orders.
#[must_use]
pub fn order_digest(sink: &RecordingSink) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (round, unit, order) in &sink.orders {
        round.hash(&mut hasher);
        unit.hash(&mut hasher);
        format!("{order:?}").hash(&mut hasher);
    }
    for (round, order) in &sink.side_orders {
        round.hash(&mut hasher);
        format!("{order:?}").hash(&mut hasher);
    }
    hasher.finish()
}

/// Play `snapshots` in order with a fresh context and return the sink.
///
/// Every snapshot must belong to the same side.
#[must_use]
pub fn replay(config: &TacticsConfig, snapshots: &[Snapshot], paths: &dyn PathSearch) -> RecordingSink {
    let mut sink = RecordingSink::new();
    let Some(first) = snapshots.first() else {
        return sink;
    };
    let mut ctx = TacticalContext::new(first.side, config.clone());
    for snap in snapshots {
        sink.begin_round(snap.round);
        ctx.run_round(snap, paths, &mut sink);
    }
    sink
}

/// Replay the same snapshots `runs` times and compare digests.
#[must_use]
pub fn check_determinism(
    config: &TacticsConfig,
    snapshots: &[Snapshot],
    paths: &dyn PathSearch,
    runs: usize,
) -> DeterminismResult {
    let hashes: Vec<u64> = (0..runs)
        .map(|_| order_digest(&replay(config, snapshots, paths)))
        .collect();
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        rounds: snapshots.len(),
    }
}
