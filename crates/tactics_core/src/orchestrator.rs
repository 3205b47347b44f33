//! Per-side tactical state and the round loop that drives it.
//!
//! [`TacticalContext`] owns everything that persists between rounds for one
//! side. [`TacticalContext::run_round`] runs the passes in a fixed order:
//!
//! 1. ingest: mine ledger, enemy memory, threat clusters, alarm
//! 2. economy and base target
//! 3. escape pre-pass
//! 4. enlist, join/split, purge
//! 5. squad behaviors in registry order, until the round budget runs out
//!
//! Any error from the sink or the path search ends the round. It is logged
//! and reported in [`RoundReport::aborted`].

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::behavior::Behavior;
use crate::claims::ClaimTable;
use crate::clustering::{build_clusters, ClusterSet};
use crate::config::TacticsConfig;
use crate::dispatch::{obstacles, RouteMode, Tactician};
use crate::error::{Result, TacticsError};
use crate::memory::{Alarm, EnemyMemory, MineLedger};
use crate::orders::CommandSink;
use crate::pathing::PathSearch;
use crate::scoring::Scorer;
use crate::snapshot::{EntityId, Side, Snapshot, UnitKind};
use crate::squads::{SquadId, SquadRegistry};
use crate::units::UnitRegistry;

/// What happened in one round for one side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundReport {
    /// Round number.
    pub round: u32,
    /// Side that played.
    pub side: Side,
    /// Unit orders handed to the sink.
    pub orders_issued: usize,
    /// Side-level orders handed to the sink.
    pub side_orders: usize,
    /// Behavior each squad ran, in run order.
    pub behaviors: Vec<(SquadId, Behavior)>,
    /// Squads left without a turn because the budget ran out.
    pub skipped_squads: usize,
    /// Wall-clock time spent, in microseconds.
    pub elapsed_us: u64,
    /// Why the round ended early, if it did.
    pub aborted: Option<String>,
}

impl RoundReport {
    fn new(round: u32, side: Side) -> Self {
        Self {
            round,
            side,
            orders_issued: 0,
            side_orders: 0,
            behaviors: Vec::new(),
            skipped_squads: 0,
            elapsed_us: 0,
            aborted: None,
        }
    }
}

/// Everything one side remembers between rounds.
pub struct TacticalContext {
    side: Side,
    config: TacticsConfig,
    scorer: Scorer,
    units: UnitRegistry,
    squads: SquadRegistry,
    claims: ClaimTable,
    memory: EnemyMemory,
    mines: MineLedger,
    alarm: Alarm,
    clusters: ClusterSet,
    rng: ChaCha8Rng,
}

impl TacticalContext {
    /// Fresh state for `side`.
    pub fn new(side: Side, config: TacticsConfig) -> Self {
        let seed = config.seed.wrapping_add(side.index() as u64);
        Self {
            side,
            scorer: Scorer::new(&config),
            units: UnitRegistry::new(),
            squads: SquadRegistry::new(),
            claims: ClaimTable::new(),
            memory: EnemyMemory::new(config.thresholds.memory_rounds),
            mines: MineLedger::new(&config.layout),
            alarm: Alarm::new(config.thresholds.alarm_rounds),
            clusters: ClusterSet::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
        }
    }

    /// Side this context plays.
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Configuration in use.
    pub const fn config(&self) -> &TacticsConfig {
        &self.config
    }

    /// Squads as of the end of the last round.
    pub const fn squads(&self) -> &SquadRegistry {
        &self.squads
    }

    /// Site claims as of the end of the last round.
    pub const fn claims(&self) -> &ClaimTable {
        &self.claims
    }

    /// Tracked own units.
    pub const fn units(&self) -> &UnitRegistry {
        &self.units
    }

    /// Threat clusters of the last round.
    pub const fn clusters(&self) -> &ClusterSet {
        &self.clusters
    }

    /// Remembered enemy sightings.
    pub const fn memory(&self) -> &EnemyMemory {
        &self.memory
    }

    /// Whether the base alarm is up in `round`.
    pub fn is_alarmed(&self, round: u32) -> bool {
        self.alarm.is_active(round)
    }

    /// Decide one round and issue its orders to `sink`.
    ///
    /// Never panics; failures end the round early and are reported.
    pub fn run_round(
        &mut self,
        snap: &Snapshot,
        paths: &dyn PathSearch,
        sink: &mut dyn CommandSink,
    ) -> RoundReport {
        let started = Instant::now();
        let mut report = RoundReport::new(snap.round, self.side);
        if let Err(err) = self.play(snap, paths, sink, started, &mut report) {
            tracing::error!(round = snap.round, side = ?self.side, error = %err, "Round aborted");
            report.aborted = Some(err.to_string());
        }
        report.elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        tracing::debug!(
            round = report.round,
            side = ?report.side,
            orders = report.orders_issued,
            side_orders = report.side_orders,
            squads = report.behaviors.len(),
            elapsed_us = report.elapsed_us,
            "Round complete"
        );
        report
    }

    fn ingest(&mut self, snap: &Snapshot) {
        self.mines.update(snap);
        self.memory.observe(snap);
        self.clusters = build_clusters(snap, self.config.thresholds.hostile_join_dist2);
        self.alarm.check(
            snap,
            self.config.layout.home(self.side),
            self.config.thresholds.alarm_radius2,
        );
        for unit in snap.own_units() {
            self.units.track(unit);
        }
    }

    fn play(
        &mut self,
        snap: &Snapshot,
        paths: &dyn PathSearch,
        sink: &mut dyn CommandSink,
        started: Instant,
        report: &mut RoundReport,
    ) -> Result<()> {
        if snap.side != self.side {
            return Err(TacticsError::InvalidSnapshot(format!(
                "snapshot for {:?} given to the {:?} context",
                snap.side, self.side
            )));
        }
        self.ingest(snap);

        let alarmed = self.alarm.is_active(snap.round);
        let budget = Duration::from_millis(self.config.round_budget_ms);
        let Self {
            config,
            scorer,
            units,
            squads,
            claims,
            memory,
            mines,
            clusters,
            rng,
            ..
        } = self;
        let blocked = obstacles(snap, &config.layout);
        let mut tactician = Tactician {
            snap,
            config,
            clusters,
            memory,
            mines,
            paths,
            obstacles: blocked,
            scorer,
            units,
            squads,
            claims,
            rng,
            sink,
            alarmed,
            route: RouteMode::Shortest,
            spent: 0,
            orders_issued: 0,
            side_orders: 0,
        };
        let outcome = tactician.play(started, budget, report);
        report.orders_issued = tactician.orders_issued;
        report.side_orders = tactician.side_orders;
        outcome
    }
}

impl Tactician<'_> {
    fn play(&mut self, started: Instant, budget: Duration, report: &mut RoundReport) -> Result<()> {
        let snap = self.snap;
        self.run_economy()?;

        let movers: Vec<EntityId> = snap
            .own_units()
            .filter(|u| u.is_active() && !matches!(u.kind, UnitKind::Base | UnitKind::Ward))
            .map(|u| u.id)
            .collect();
        for id in movers {
            self.escape(id)?;
        }

        self.squads.enlist(self.units, snap);
        self.regroup();
        self.squads.purge_empty(self.claims);

        let order = self.squads.ids();
        for (i, &id) in order.iter().enumerate() {
            if started.elapsed() > budget {
                let overrun = TacticsError::DeadlineExceeded {
                    round: snap.round,
                    budget_ms: budget.as_millis() as u64,
                };
                report.skipped_squads = order.len() - i;
                tracing::warn!(skipped = report.skipped_squads, "{overrun}");
                break;
            }
            if let Some(behavior) = self.run_squad(id)? {
                report.behaviors.push((id, behavior));
            }
        }
        Ok(())
    }
}

/// Both sides' contexts, routing each snapshot to its side.
pub struct Commander {
    contexts: [TacticalContext; 2],
}

impl Commander {
    /// One context per side sharing `config`.
    pub fn new(config: TacticsConfig) -> Self {
        Self {
            contexts: [
                TacticalContext::new(Side::First, config.clone()),
                TacticalContext::new(Side::Second, config),
            ],
        }
    }

    /// Context of a side.
    pub const fn context(&self, side: Side) -> &TacticalContext {
        &self.contexts[side.index()]
    }

    /// Decide a round for the side the snapshot belongs to.
    pub fn on_round(
        &mut self,
        snap: &Snapshot,
        paths: &dyn PathSearch,
        sink: &mut dyn CommandSink,
    ) -> RoundReport {
        self.contexts[snap.side.index()].run_round(snap, paths, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::GridPos;
    use crate::orders::{Order, SideOrder};
    use crate::pathing::NavGrid;
    use crate::snapshot::{Economy, HeightMap, UnitRecord};

    #[derive(Default)]
    struct Collect {
        orders: Vec<(EntityId, Order)>,
        side: Vec<SideOrder>,
    }

    impl CommandSink for Collect {
        fn issue(&mut self, unit: EntityId, order: Order) -> Result<()> {
            self.orders.push((unit, order));
            Ok(())
        }

        fn issue_side(&mut self, order: SideOrder) -> Result<()> {
            self.side.push(order);
            Ok(())
        }
    }

    struct Refuse;

    impl CommandSink for Refuse {
        fn issue(&mut self, unit: EntityId, _order: Order) -> Result<()> {
            Err(TacticsError::CommandRejected {
                unit,
                reason: "engine closed".into(),
            })
        }

        fn issue_side(&mut self, _order: SideOrder) -> Result<()> {
            Ok(())
        }
    }

    fn tank(id: EntityId, side: Side, x: i32, y: i32) -> UnitRecord {
        UnitRecord {
            id,
            side: Some(side),
            kind: UnitKind::Tank,
            position: GridPos::new(x, y),
            hp: 100,
            max_hp: 100,
            attack: 10,
            defense: 5,
            speed: 4,
            vision: 64,
            range: 9,
            ..UnitRecord::default()
        }
    }

    fn snapshot(round: u32, side: Side, units: Vec<UnitRecord>) -> Snapshot {
        Snapshot::new(round, side, units, HeightMap::flat(150, 150), Economy::default())
    }

    #[test]
    fn test_wrong_side_aborts() {
        let mut ctx = TacticalContext::new(Side::First, TacticsConfig::default());
        let grid = NavGrid::open(150, 150);
        let mut sink = Collect::default();
        let report = ctx.run_round(&snapshot(1, Side::Second, vec![]), &grid, &mut sink);
        assert!(report.aborted.is_some());
        assert!(sink.orders.is_empty());
    }

    #[test]
    fn test_idle_units_get_one_order_each() {
        let mut ctx = TacticalContext::new(Side::First, TacticsConfig::default());
        let grid = NavGrid::open(150, 150);
        let mut sink = Collect::default();
        let units = vec![tank(1, Side::First, 30, 30), tank(2, Side::First, 60, 20)];
        let report = ctx.run_round(&snapshot(1, Side::First, units), &grid, &mut sink);
        assert!(report.aborted.is_none());
        assert_eq!(report.orders_issued, 2);
        let mut ids: Vec<EntityId> = sink.orders.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert!(report
            .behaviors
            .iter()
            .all(|(_, b)| *b == Behavior::Search));
    }

    #[test]
    fn test_sink_error_aborts_round() {
        let mut ctx = TacticalContext::new(Side::First, TacticsConfig::default());
        let grid = NavGrid::open(150, 150);
        let report = ctx.run_round(
            &snapshot(1, Side::First, vec![tank(1, Side::First, 30, 30)]),
            &grid,
            &mut Refuse,
        );
        assert!(report
            .aborted
            .as_deref()
            .is_some_and(|m| m.contains("engine closed")));
    }

    #[test]
    fn test_zero_budget_skips_squads() {
        let config = TacticsConfig {
            round_budget_ms: 0,
            ..TacticsConfig::default()
        };
        let mut ctx = TacticalContext::new(Side::First, config);
        let grid = NavGrid::open(150, 150);
        let mut sink = Collect::default();
        let units = vec![tank(1, Side::First, 30, 30), tank(2, Side::First, 90, 20)];
        let report = ctx.run_round(&snapshot(1, Side::First, units), &grid, &mut sink);
        assert_eq!(report.behaviors.len() + report.skipped_squads, 2);
    }

    #[test]
    fn test_commander_routes_by_side() {
        let mut commander = Commander::new(TacticsConfig::default());
        let grid = NavGrid::open(150, 150);
        let mut sink = Collect::default();
        commander.on_round(
            &snapshot(1, Side::Second, vec![tank(7, Side::Second, 120, 120)]),
            &grid,
            &mut sink,
        );
        assert_eq!(commander.context(Side::Second).squads().len(), 1);
        assert!(commander.context(Side::First).squads().is_empty());
    }
}
