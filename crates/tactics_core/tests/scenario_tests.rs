//! Scenario tests driving whole rounds through a tactical context.
//!
//! Each test builds snapshots with the shared fixtures, runs one or more
//! rounds and inspects the orders captured by a [`RecordingSink`].

use tactics_core::behavior::Behavior;
use tactics_core::config::TacticsConfig;
use tactics_core::math::GridPos;
use tactics_core::orchestrator::TacticalContext;
use tactics_core::orders::{Order, Route, SideOrder};
use tactics_core::snapshot::{Effect, Side, Snapshot, UnitKind};
use tactics_test_utils::determinism::{check_determinism, replay};
use tactics_test_utils::fixtures::{
    base, hero, monster, open_grid, site, with_effect, with_hp, SnapshotBuilder,
};
use tactics_test_utils::sink::RecordingSink;

fn relaxed_config() -> TacticsConfig {
    TacticsConfig {
        round_budget_ms: 60_000,
        ..TacticsConfig::default()
    }
}

/// A crowded mid-map fight used by the invariant tests.
fn skirmish(round: u32) -> Snapshot {
    SnapshotBuilder::new(Side::First)
        .round(round)
        .economy(800, 0, 2000)
        .units([
            base(200, Side::First),
            hero(1, Side::First, UnitKind::Tank, 30, 30),
            hero(2, Side::First, UnitKind::Caster, 32, 31),
            hero(3, Side::First, UnitKind::Berserker, 31, 33),
            hero(4, Side::First, UnitKind::Scout, 28, 29),
            hero(5, Side::First, UnitKind::Tank, 60, 62),
            hero(6, Side::First, UnitKind::Caster, 62, 60),
            hero(101, Side::Second, UnitKind::Tank, 38, 36),
            with_effect(
                hero(102, Side::Second, UnitKind::Berserker, 33, 31),
                Effect::Undying,
                3,
            ),
            monster(103, 64, 66),
            site(104, 70, 70, 300),
            hero(105, Side::Second, UnitKind::Scout, 40, 40),
        ])
        .build()
}

fn run_rounds(ctx: &mut TacticalContext, sink: &mut RecordingSink, snaps: &[Snapshot]) {
    let grid = open_grid();
    for snap in snaps {
        sink.begin_round(snap.round);
        let report = ctx.run_round(snap, &grid, sink);
        assert!(report.aborted.is_none(), "round {} aborted: {:?}", snap.round, report.aborted);
    }
}

#[test]
fn test_at_most_one_order_per_unit_per_round() {
    let snaps: Vec<Snapshot> = (1..=5).map(skirmish).collect();
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();
    run_rounds(&mut ctx, &mut sink, &snaps);

    assert!(sink.violations.is_empty(), "violations: {:?}", sink.violations);
    assert!(sink.orders_in(1).count() > 0);
}

#[test]
fn test_low_health_squad_retreats_home() {
    let home = TacticsConfig::default().layout.home(Side::First);
    let snap = SnapshotBuilder::new(Side::First)
        .units([
            with_hp(hero(1, Side::First, UnitKind::Tank, 70, 70), 30),
            with_hp(hero(2, Side::First, UnitKind::Tank, 72, 70), 30),
            with_hp(hero(3, Side::First, UnitKind::Tank, 70, 72), 30),
        ])
        .build();
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();
    run_rounds(&mut ctx, &mut sink, &[snap]);

    for unit in 1..=3 {
        match sink.order_for(unit, 1) {
            Some(Order::Move { to, route }) => {
                assert_eq!(*to, home);
                assert!(matches!(route, Route::HazardAware { .. }));
            }
            other => panic!("unit {unit} expected a move home, got {other:?}"),
        }
    }
}

#[test]
fn test_nearby_squads_join_in_registry_order() {
    let snap = |round| {
        SnapshotBuilder::new(Side::First)
            .round(round)
            .units([
                hero(1, Side::First, UnitKind::Tank, 30, 30),
                hero(2, Side::First, UnitKind::Tank, 34, 30),
                hero(3, Side::First, UnitKind::Tank, 30, 34),
            ])
            .build()
    };
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();

    // Squads formed this round never merge.
    run_rounds(&mut ctx, &mut sink, &[snap(1)]);
    assert_eq!(ctx.squads().len(), 3);
    let last = ctx.units().squad_of(3).expect("unit 3 enlisted");

    // Each squad folds into the next eligible one: 1 -> 2 -> 3.
    run_rounds(&mut ctx, &mut sink, &[snap(2)]);
    assert_eq!(ctx.squads().len(), 1);
    let merged = ctx.squads().get(last).expect("last squad survives");
    let mut members = merged.members().to_vec();
    members.sort_unstable();
    assert_eq!(members, vec![1, 2, 3]);
    for unit in 1..=3 {
        assert_eq!(ctx.units().squad_of(unit), Some(last));
    }
}

#[test]
fn test_older_squad_waits_a_round_before_joining_newcomer() {
    let veteran = hero(1, Side::First, UnitKind::Tank, 40, 40);
    let newcomer = hero(2, Side::First, UnitKind::Tank, 42, 40);
    let round1 = SnapshotBuilder::new(Side::First)
        .round(1)
        .unit(veteran.clone())
        .build();
    let later = |round| {
        SnapshotBuilder::new(Side::First)
            .round(round)
            .units([veteran.clone(), newcomer.clone()])
            .build()
    };
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();

    run_rounds(&mut ctx, &mut sink, &[round1]);
    let older = ctx.units().squad_of(1).expect("unit 1 enlisted");

    // The newcomer's squad is formed this round, so nothing may join it yet.
    run_rounds(&mut ctx, &mut sink, &[later(2)]);
    assert_eq!(ctx.squads().len(), 2);
    let younger = ctx.units().squad_of(2).expect("unit 2 enlisted");
    assert_ne!(older, younger);
    assert_eq!(ctx.units().squad_of(1), Some(older));

    // A round later the older squad comes first in registry order and folds
    // into the newcomer's.
    run_rounds(&mut ctx, &mut sink, &[later(3)]);
    assert_eq!(ctx.squads().len(), 1);
    assert_eq!(ctx.units().squad_of(1), Some(younger));
    assert_eq!(ctx.units().squad_of(2), Some(younger));
    assert!(ctx.squads().get(older).is_none());
}

#[test]
fn test_retreat_gives_up_claimed_site() {
    let target = GridPos::new(40, 40);
    let snap = |round, hp| {
        SnapshotBuilder::new(Side::First)
            .round(round)
            .units([
                with_hp(hero(1, Side::First, UnitKind::Tank, 30, 30), hp),
                with_hp(hero(2, Side::First, UnitKind::Tank, 32, 30), hp),
                with_hp(hero(3, Side::First, UnitKind::Tank, 30, 32), hp),
                site(50, target.x, target.y, 500),
            ])
            .build()
    };
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();
    run_rounds(&mut ctx, &mut sink, &[snap(1, 300), snap(2, 300)]);
    let squad = ctx.units().squad_of(1).expect("enlisted");
    assert_eq!(ctx.claims().holder(target), Some(squad));

    run_rounds(&mut ctx, &mut sink, &[snap(3, 30)]);
    let home = TacticsConfig::default().layout.home(Side::First);
    assert!(matches!(
        sink.order_for(1, 3),
        Some(Order::Move { to, .. }) if *to == home
    ));
    assert_eq!(ctx.claims().len(), 0);
    assert_eq!(ctx.squads().get(squad).and_then(|s| s.claim()), None);
}

#[test]
fn test_contest_claims_visible_site() {
    let target = GridPos::new(40, 40);
    let snap = |round| {
        SnapshotBuilder::new(Side::First)
            .round(round)
            .units([
                hero(1, Side::First, UnitKind::Tank, 30, 30),
                hero(2, Side::First, UnitKind::Tank, 32, 30),
                hero(3, Side::First, UnitKind::Tank, 30, 32),
                site(50, target.x, target.y, 500),
            ])
            .build()
    };
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();
    run_rounds(&mut ctx, &mut sink, &[snap(1), snap(2)]);

    let squad = ctx.units().squad_of(1).expect("enlisted");
    assert_eq!(ctx.claims().holder(target), Some(squad));
    assert_eq!(ctx.squads().get(squad).and_then(|s| s.claim()), Some(target));
    for (pos, holder) in ctx.claims().iter() {
        assert_eq!(ctx.squads().get(holder).and_then(|s| s.claim()), Some(pos));
    }
}

#[test]
fn test_escape_from_enraged_berserker() {
    let snap = SnapshotBuilder::new(Side::First)
        .units([
            hero(1, Side::First, UnitKind::Tank, 50, 50),
            with_effect(
                hero(9, Side::Second, UnitKind::Berserker, 52, 50),
                Effect::Undying,
                2,
            ),
        ])
        .build();
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();
    run_rounds(&mut ctx, &mut sink, &[snap]);

    assert_eq!(
        sink.order_for(1, 1),
        Some(&Order::move_to(GridPos::new(48, 50)))
    );
    assert!(sink.violations.is_empty());
}

#[test]
fn test_lone_scout_heads_for_a_site() {
    let snap = SnapshotBuilder::new(Side::First)
        .unit(hero(4, Side::First, UnitKind::Scout, 20, 20))
        .build();
    let config = relaxed_config();
    let sites = config.layout.scoutable_sites().to_vec();
    let mut ctx = TacticalContext::new(Side::First, config);
    let mut sink = RecordingSink::new();
    let report = ctx.run_round(&snap, &open_grid(), &mut sink);

    assert_eq!(report.behaviors.len(), 1);
    assert_eq!(report.behaviors[0].1, Behavior::Scout);
    let dest = sink
        .order_for(4, 0)
        .and_then(Order::destination)
        .expect("scout was moved");
    assert!(sites.contains(&dest));
    let squad = ctx.units().squad_of(4).expect("enlisted");
    assert_eq!(ctx.squads().get(squad).and_then(|s| s.scout_target()), Some(dest));
}

#[test]
fn test_intruder_raises_alarm_and_defense() {
    let snap = SnapshotBuilder::new(Side::First)
        .units([
            hero(1, Side::First, UnitKind::Tank, 20, 20),
            hero(9, Side::Second, UnitKind::Scout, 20, 15),
        ])
        .build();
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();
    sink.begin_round(1);
    let report = ctx.run_round(&snap, &open_grid(), &mut sink);

    assert!(ctx.is_alarmed(1));
    assert_eq!(report.behaviors.len(), 1);
    assert_eq!(report.behaviors[0].1, Behavior::BaseDefense);
    assert!(sink.order_for(1, 1).is_some());
    assert!(sink
        .side_orders_in(1)
        .any(|o| *o == SideOrder::BaseAttack(9)));
}

#[test]
fn test_hiring_favors_missing_kinds_within_budget() {
    let snap = SnapshotBuilder::new(Side::First)
        .economy(1000, 0, 1000)
        .unit(base(200, Side::First))
        .build();
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();
    run_rounds(&mut ctx, &mut sink, &[snap]);

    let hires: Vec<SideOrder> = sink.side_orders_in(1).copied().collect();
    assert_eq!(
        hires,
        vec![
            SideOrder::Hire(UnitKind::Tank),
            SideOrder::Hire(UnitKind::Caster),
            SideOrder::Hire(UnitKind::Berserker),
        ]
    );
}

#[test]
fn test_committed_gold_blocks_hiring() {
    let snap = SnapshotBuilder::new(Side::First)
        .economy(1000, 900, 1000)
        .build();
    let mut ctx = TacticalContext::new(Side::First, relaxed_config());
    let mut sink = RecordingSink::new();
    run_rounds(&mut ctx, &mut sink, &[snap]);
    assert_eq!(sink.side_orders_in(1).count(), 0);
}

#[test]
fn test_replay_is_deterministic() {
    let snaps: Vec<Snapshot> = (1..=4).map(skirmish).collect();
    let result = check_determinism(&relaxed_config(), &snaps, &open_grid(), 3);
    result.assert_deterministic();
}

#[test]
fn test_different_seeds_still_respect_invariants() {
    let snaps: Vec<Snapshot> = (1..=3).map(skirmish).collect();
    for seed in [1, 2, 3] {
        let config = TacticsConfig {
            seed,
            ..relaxed_config()
        };
        let sink = replay(&config, &snaps, &open_grid());
        assert!(sink.violations.is_empty());
    }
}
