//! Round benchmarks for tactics_core.
//!
//! Run with: `cargo bench -p tactics_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tactics_core::clustering::build_clusters;
use tactics_core::config::TacticsConfig;
use tactics_core::orchestrator::TacticalContext;
use tactics_core::snapshot::{Side, Snapshot, UnitKind};
use tactics_test_utils::fixtures::{hero, monster, open_grid, site, SnapshotBuilder};
use tactics_test_utils::sink::RecordingSink;

/// Two armies of `per_side` heroes facing each other mid-map.
fn battle(round: u32, per_side: u32) -> Snapshot {
    let mut builder = SnapshotBuilder::new(Side::First).round(round);
    for i in 0..per_side {
        let kind = UnitKind::HEROES[(i % 4) as usize];
        let offset = (i % 8) as i32 * 3;
        let row = (i / 8) as i32 * 3;
        builder = builder
            .unit(hero(i + 1, Side::First, kind, 40 + offset, 40 + row))
            .unit(hero(1000 + i, Side::Second, kind, 70 + offset, 70 + row));
    }
    builder
        .unit(site(5000, 75, 75, 400))
        .unit(site(5001, 30, 110, 200))
        .unit(monster(5002, 100, 40))
        .build()
}

pub fn clustering_benchmark(c: &mut Criterion) {
    let snap = battle(1, 32);
    c.bench_function("build_clusters_64", |b| {
        b.iter(|| black_box(build_clusters(black_box(&snap), 169)));
    });
}

pub fn round_benchmark(c: &mut Criterion) {
    let grid = open_grid();
    let snaps: Vec<Snapshot> = (1..=5).map(|r| battle(r, 12)).collect();
    c.bench_function("five_rounds_12v12", |b| {
        b.iter(|| {
            let config = TacticsConfig {
                round_budget_ms: 60_000,
                ..TacticsConfig::default()
            };
            let mut ctx = TacticalContext::new(Side::First, config);
            let mut sink = RecordingSink::new();
            for snap in &snaps {
                sink.begin_round(snap.round);
                black_box(ctx.run_round(snap, &grid, &mut sink));
            }
            sink.orders.len()
        })
    });
}

criterion_group!(benches, clustering_benchmark, round_benchmark);
criterion_main!(benches);
