//! Round working set and unit-level command dispatch.
//!
//! A [`Tactician`] borrows everything one round needs from the
//! [`TacticalContext`](crate::orchestrator::TacticalContext). Behaviors,
//! role decisions, regrouping and the economy are all methods on it, spread
//! over their own modules.

use std::collections::HashSet;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::claims::ClaimTable;
use crate::clustering::{ClusterId, ClusterSet};
use crate::config::{MapLayout, TacticsConfig};
use crate::error::Result;
use crate::math::{root, GridPos, Vec2Fixed};
use crate::memory::{EnemyMemory, MineLedger};
use crate::orders::{CommandSink, Order, Route, SideOrder};
use crate::pathing::{HazardAwarePath, PathSearch};
use crate::scoring::Scorer;
use crate::snapshot::{Effect, EntityId, Snapshot, UnitKind, UnitRecord};
use crate::squads::{SquadId, SquadRegistry};
use crate::units::UnitRegistry;

/// Routing applied to moves issued while it is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum RouteMode {
    #[default]
    Shortest,
    HazardAware,
}

/// A squad as seen by its behavior this round.
#[derive(Debug, Clone)]
pub(crate) struct SquadView {
    pub id: SquadId,
    pub members: Vec<EntityId>,
    pub centroid: GridPos,
    pub engaged: Option<ClusterId>,
}

/// Everything one side needs while deciding a round.
pub(crate) struct Tactician<'a> {
    pub snap: &'a Snapshot,
    pub config: &'a TacticsConfig,
    pub clusters: &'a ClusterSet,
    pub memory: &'a EnemyMemory,
    pub mines: &'a MineLedger,
    pub paths: &'a dyn PathSearch,
    pub obstacles: HashSet<GridPos>,
    pub scorer: &'a mut Scorer,
    pub units: &'a mut UnitRegistry,
    pub squads: &'a mut SquadRegistry,
    pub claims: &'a mut ClaimTable,
    pub rng: &'a mut ChaCha8Rng,
    pub sink: &'a mut dyn CommandSink,
    pub alarmed: bool,
    pub route: RouteMode,
    pub spent: i32,
    pub orders_issued: usize,
    pub side_orders: usize,
}

/// Cells a unit cannot stand on: other units, site footprints and bases.
pub(crate) fn obstacles(snap: &Snapshot, layout: &MapLayout) -> HashSet<GridPos> {
    let mut cells: HashSet<GridPos> = snap
        .units
        .iter()
        .filter(|u| u.is_alive())
        .map(|u| u.position)
        .collect();
    let half = layout.site_footprint;
    for site in snap.units.iter().filter(|u| u.kind == UnitKind::Site) {
        for dx in -half..=half {
            for dy in -half..=half {
                cells.insert(site.position.offset(dx, dy));
            }
        }
    }
    cells.extend(layout.bases.iter().copied());
    cells
}

/// Uniform cell inside a disc; the center if sampling keeps missing.
pub(crate) fn random_point_in_disc(rng: &mut ChaCha8Rng, center: GridPos, radius2: i64) -> GridPos {
    let r = root(i32::try_from(radius2).unwrap_or(i32::MAX)).to_num::<i32>();
    if r <= 0 {
        return center;
    }
    for _ in 0..32 {
        let dx = rng.gen_range(-r..=r);
        let dy = rng.gen_range(-r..=r);
        if i64::from(dx).pow(2) + i64::from(dy).pow(2) <= radius2 {
            return center.offset(dx, dy);
        }
    }
    center
}

impl<'a> Tactician<'a> {
    pub(crate) const fn round(&self) -> u32 {
        self.snap.round
    }

    pub(crate) const fn home(&self) -> GridPos {
        self.config.layout.home(self.snap.side)
    }

    pub(crate) const fn enemy_base(&self) -> GridPos {
        self.config.layout.enemy_base(self.snap.side)
    }

    /// Run `f` with moves routed by `mode`, restoring the previous routing.
    pub(crate) fn with_route<R>(&mut self, mode: RouteMode, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.route, mode);
        let out = f(self);
        self.route = previous;
        out
    }

    /// Current members, centroid and engagement of a squad.
    pub(crate) fn squad_view(&mut self, id: SquadId) -> Option<SquadView> {
        let snap = self.snap;
        let squad = self.squads.get(id)?;
        let centroid = squad.centroid(snap)?;
        let engaged = self
            .scorer
            .engaged_cluster(snap, self.clusters, self.memory, squad);
        Some(SquadView {
            id,
            members: squad.members().to_vec(),
            centroid,
            engaged,
        })
    }

    /// Where a unit at `from` actually ends up when heading for `to`.
    pub(crate) fn reachable(&self, from: GridPos, to: GridPos) -> Result<GridPos> {
        let path = self.paths.find_path(from, to, &self.obstacles)?;
        Ok(path.last().copied().unwrap_or(from))
    }

    /// A move toward `to` under the current routing.
    pub(crate) fn move_order(&self, me: &UnitRecord, to: GridPos) -> Result<Order> {
        if self.route == RouteMode::Shortest {
            return Ok(Order::move_to(to));
        }
        let hazards = self
            .memory
            .recent(self.round())
            .filter(|(_, s)| s.kind != UnitKind::Ward)
            .map(|(_, s)| s.position)
            .collect();
        let search = HazardAwarePath::new(
            self.paths,
            hazards,
            self.config.layout.map_size,
            &self.config.thresholds,
        );
        let waypoints = search.find_path(me.position, to, &self.obstacles)?;
        Ok(Order::Move {
            to,
            route: Route::HazardAware { waypoints },
        })
    }

    /// Hand an order to the sink unless the unit already acted this round.
    pub(crate) fn emit(&mut self, unit: EntityId, order: Order) -> Result<bool> {
        let round = self.round();
        if self.units.acted_in(unit, round) {
            tracing::warn!(round, unit, ?order, "Unit already acted this round, dropping order");
            return Ok(false);
        }
        if let Some(rec) = self.snap.unit(unit) {
            self.units.track(rec);
        }
        tracing::trace!(round, unit, ?order, "Issuing order");
        self.sink.issue(unit, order)?;
        self.units.mark_acted(unit, round);
        self.orders_issued += 1;
        Ok(true)
    }

    /// Hand a side-level order to the sink.
    pub(crate) fn emit_side(&mut self, order: SideOrder) -> Result<()> {
        self.sink.issue_side(order)?;
        self.side_orders += 1;
        Ok(())
    }

    /// The unit's record if it can still take an order this round.
    fn ready_unit(&self, id: EntityId) -> Option<&'a UnitRecord> {
        let snap: &'a Snapshot = self.snap;
        let Some(me) = snap.unit(id) else {
            tracing::warn!(round = snap.round, unit = id, "Unit gone from snapshot");
            return None;
        };
        if !me.is_alive() {
            return None;
        }
        if self.units.acted_in(id, snap.round) {
            tracing::debug!(round = snap.round, unit = id, "Unit already acted this round");
            return None;
        }
        Some(me)
    }

    /// Have one member attack a cluster.
    pub(crate) fn command_attack(&mut self, view: &SquadView, id: EntityId, cluster: ClusterId) -> Result<()> {
        let Some(me) = self.ready_unit(id) else {
            return Ok(());
        };
        let order = self.decide_attack(view, me, cluster)?;
        self.emit(id, order)?;
        Ok(())
    }

    /// Have one member head for a point. A mining unit sent to a visible
    /// site contests it instead.
    pub(crate) fn command_move(&mut self, view: &SquadView, id: EntityId, dest: GridPos) -> Result<()> {
        let Some(me) = self.ready_unit(id) else {
            return Ok(());
        };
        let site = if me.has(Effect::Mining) {
            self.clusters
                .site_cluster_near(self.snap, dest, self.config.rules.mining_range)
        } else {
            None
        };
        let order = match site {
            Some(cluster) => self.contest_order(view, me, cluster)?,
            None => self.decide_move(view, me, dest)?,
        };
        self.emit(id, order)?;
        Ok(())
    }

    /// Have one member contest the site held by a cluster.
    pub(crate) fn command_contest(&mut self, view: &SquadView, id: EntityId, cluster: ClusterId) -> Result<()> {
        let Some(me) = self.ready_unit(id) else {
            return Ok(());
        };
        let order = self.contest_order(view, me, cluster)?;
        self.emit(id, order)?;
        Ok(())
    }

    fn contest_order(&mut self, view: &SquadView, me: &UnitRecord, cluster: ClusterId) -> Result<Order> {
        let snap = self.snap;
        let lone_site = self
            .clusters
            .get(cluster)
            .filter(|c| c.is_lone_site(snap))
            .and_then(|c| c.site(snap))
            .map(|site| site.position);
        match lone_site {
            Some(site) => self.with_route(RouteMode::HazardAware, |t| t.decide_move(view, me, site)),
            None => self.decide_attack(view, me, cluster),
        }
    }

    /// Step out of range of an enraged berserker if the step lands safe.
    ///
    /// Returns whether the unit moved.
    pub(crate) fn escape(&mut self, id: EntityId) -> Result<bool> {
        let snap = self.snap;
        let Some(me) = snap.unit(id) else {
            return Ok(false);
        };
        if !me.is_active() || self.units.acted_in(id, snap.round) {
            return Ok(false);
        }
        let threats: Vec<&UnitRecord> = snap
            .hostile_units()
            .filter(|u| {
                u.is_alive()
                    && u.kind == UnitKind::Berserker
                    && u.has(Effect::Undying)
                    && !u.has(Effect::Stunned)
                    && me.position.within(u.position, i64::from(u.range))
            })
            .collect();
        if threats.is_empty() {
            return Ok(false);
        }
        let here = me.position.to_fixed();
        let away = threats
            .iter()
            .fold(Vec2Fixed::ZERO, |acc, u| acc - (u.position.to_fixed() - here));
        if away.is_zero() {
            return Ok(false);
        }
        let dest = (here + away.with_length(root(me.speed))).round_to_grid();
        let landing = self.reachable(me.position, dest)?;
        if threats
            .iter()
            .any(|u| landing.within(u.position, i64::from(u.range)))
        {
            return Ok(false);
        }
        tracing::debug!(round = snap.round, unit = id, ?dest, "Escaping enraged berserker");
        self.emit(id, Order::move_to(dest))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A hand-built round for driving behaviors one squad at a time.

    use super::*;
    use rand::SeedableRng;

    use crate::clustering::build_clusters;
    use crate::pathing::NavGrid;
    use crate::snapshot::{Ability, AbilityState, Economy, HeightMap, Side, StatusEffect};

    /// Sink that keeps everything it is handed.
    #[derive(Default)]
    pub(crate) struct Collect {
        pub orders: Vec<(EntityId, Order)>,
        pub side: Vec<SideOrder>,
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

    /// Persistent state of one side, minus the orchestrator.
    pub(crate) struct Rig {
        pub config: TacticsConfig,
        pub scorer: Scorer,
        pub units: UnitRegistry,
        pub squads: SquadRegistry,
        pub claims: ClaimTable,
        pub memory: EnemyMemory,
        pub mines: MineLedger,
        pub rng: ChaCha8Rng,
        pub grid: NavGrid,
        pub sink: Collect,
    }

    impl Rig {
        pub fn new() -> Self {
            let config = TacticsConfig::default();
            Self {
                scorer: Scorer::new(&config),
                units: UnitRegistry::new(),
                squads: SquadRegistry::new(),
                claims: ClaimTable::new(),
                memory: EnemyMemory::new(config.thresholds.memory_rounds),
                mines: MineLedger::new(&config.layout),
                rng: ChaCha8Rng::seed_from_u64(config.seed),
                grid: NavGrid::open(config.layout.map_size, config.layout.map_size),
                sink: Collect::default(),
                config,
            }
        }

        /// Enlist the own units of `snap` and fold `ids` into one squad.
        pub fn squad(&mut self, snap: &Snapshot, ids: &[EntityId]) -> SquadId {
            self.squads.enlist(&mut self.units, snap);
            let squads: Vec<SquadId> = ids.iter().filter_map(|&id| self.units.squad_of(id)).collect();
            let (&keep, rest) = squads.split_first().expect("at least one member");
            for &other in rest {
                self.squads.merge_into(&mut self.units, &mut self.claims, other, keep);
            }
            self.squads.purge_empty(&mut self.claims);
            keep
        }

        /// Ingest `snap` and run `f` against a fresh round.
        pub fn round<R>(&mut self, snap: &Snapshot, alarmed: bool, f: impl FnOnce(&mut Tactician<'_>) -> R) -> R {
            self.memory.observe(snap);
            self.mines.update(snap);
            self.squads.enlist(&mut self.units, snap);
            let clusters = build_clusters(snap, self.config.thresholds.hostile_join_dist2);
            let mut tactician = Tactician {
                snap,
                config: &self.config,
                clusters: &clusters,
                memory: &self.memory,
                mines: &self.mines,
                paths: &self.grid,
                obstacles: obstacles(snap, &self.config.layout),
                scorer: &mut self.scorer,
                units: &mut self.units,
                squads: &mut self.squads,
                claims: &mut self.claims,
                rng: &mut self.rng,
                sink: &mut self.sink,
                alarmed,
                route: RouteMode::Shortest,
                spent: 0,
                orders_issued: 0,
                side_orders: 0,
            };
            f(&mut tactician)
        }
    }

    /// Full-health tank with attack and stun ready.
    pub(crate) fn tank(id: EntityId, side: Side, x: i32, y: i32) -> UnitRecord {
        UnitRecord {
            id,
            side: Some(side),
            kind: UnitKind::Tank,
            position: GridPos::new(x, y),
            hp: 300,
            max_hp: 300,
            mp: 100,
            max_mp: 100,
            attack: 15,
            defense: 10,
            speed: 4,
            vision: 64,
            range: 9,
            abilities: vec![
                AbilityState {
                    ability: Ability::Attack,
                    cooldown: 0,
                    max_cooldown: 1,
                },
                AbilityState {
                    ability: Ability::Stun,
                    cooldown: 0,
                    max_cooldown: 10,
                },
            ],
            ..UnitRecord::default()
        }
    }

    pub(crate) fn with_effect(mut unit: UnitRecord, effect: Effect, remaining: i32) -> UnitRecord {
        unit.effects.push(StatusEffect { effect, remaining });
        unit
    }

    pub(crate) fn snapshot(round: u32, units: Vec<UnitRecord>) -> Snapshot {
        Snapshot::new(round, Side::First, units, HeightMap::flat(150, 150), Economy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_random_point_stays_in_disc() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let center = GridPos::new(40, 40);
        for _ in 0..200 {
            let p = random_point_in_disc(&mut rng, center, 50);
            assert!(p.within(center, 50));
        }
    }

    #[test]
    fn test_random_point_huge_radius_does_not_overflow() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let center = GridPos::new(0, 0);
        let radius2 = i64::from(i32::MAX);
        for _ in 0..200 {
            let p = random_point_in_disc(&mut rng, center, radius2);
            assert!(p.within(center, radius2));
        }
    }

    #[test]
    fn test_random_point_zero_radius() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let center = GridPos::new(3, 4);
        assert_eq!(random_point_in_disc(&mut rng, center, 0), center);
    }

    #[test]
    fn test_obstacles_cover_sites_and_bases() {
        use crate::snapshot::{Economy, HeightMap, Side};
        let layout = MapLayout::default();
        let site = UnitRecord {
            id: 1,
            kind: UnitKind::Site,
            position: GridPos::new(75, 75),
            ..UnitRecord::default()
        };
        let snap = Snapshot::new(1, Side::First, vec![site], HeightMap::flat(150, 150), Economy::default());
        let cells = obstacles(&snap, &layout);
        assert!(cells.contains(&GridPos::new(77, 73)));
        assert!(!cells.contains(&GridPos::new(78, 75)));
        assert!(cells.contains(&layout.bases[0]));
        assert!(cells.contains(&layout.bases[1]));
    }
}
