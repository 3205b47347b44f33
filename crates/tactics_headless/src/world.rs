//! A movement-only world for headless matches.
//!
//! The world owns every unit, builds a [`Snapshot`] per side each round and
//! receives the core's orders through [`CommandSink`]. Only movement and
//! hiring change the world; attacks, casts and the remaining side orders are
//! logged and otherwise ignored.

use std::collections::HashSet;

use serde::Serialize;
use tactics_core::config::{GameRules, TacticsConfig};
use tactics_core::error::{Result, TacticsError};
use tactics_core::math::{root, GridPos};
use tactics_core::orders::{CommandSink, Order, Route, SideOrder};
use tactics_core::pathing::NavGrid;
use tactics_core::snapshot::{Economy, EntityId, HeightMap, Side, Snapshot, UnitKind, UnitRecord};

use crate::scenario::{spawn_record, Scenario, UnitStats};

/// One line of the command log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    /// An order to one unit.
    Unit {
        /// Round the order was issued in.
        round: u32,
        /// Issuing side.
        side: Side,
        /// Addressed unit.
        unit: EntityId,
        /// The order.
        order: Order,
    },
    /// A side-level order.
    Side {
        /// Round the order was issued in.
        round: u32,
        /// Issuing side.
        side: Side,
        /// The order.
        order: SideOrder,
    },
}

impl LogEntry {
    /// Serialize to a JSON line (with trailing newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":"Serialization failed: {}"}}"#,
                e
            )
        });
        json.push('\n');
        json
    }
}

/// World state advanced between rounds.
#[derive(Debug, Clone)]
pub struct MovementWorld {
    round: u32,
    active: Side,
    units: Vec<UnitRecord>,
    heights: HeightMap,
    grid: NavGrid,
    gold: [i32; 2],
    homes: [GridPos; 2],
    rules: GameRules,
    ordered: HashSet<EntityId>,
    moves: Vec<(EntityId, Order)>,
    hires: Vec<(Side, UnitKind)>,
    log: Vec<LogEntry>,
    next_id: EntityId,
}

impl MovementWorld {
    /// Round 1 of `scenario` on the layout of `config`.
    #[must_use]
    pub fn new(scenario: &Scenario, config: &TacticsConfig) -> Self {
        let size = config.layout.map_size;
        let mut grid = NavGrid::open(size, size);
        for &(x, y) in &scenario.walls {
            if !grid.set_wall(GridPos::new(x, y)) {
                tracing::warn!(x, y, "Wall outside the map ignored");
            }
        }
        let units: Vec<UnitRecord> = scenario.units.iter().map(|p| p.record()).collect();
        let next_id = units.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        Self {
            round: 1,
            active: Side::First,
            units,
            heights: scenario.height_map(size),
            grid,
            gold: [
                scenario.starting_gold(Side::First),
                scenario.starting_gold(Side::Second),
            ],
            homes: config.layout.bases,
            rules: config.rules.clone(),
            ordered: HashSet::new(),
            moves: Vec::new(),
            hires: Vec::new(),
            log: Vec::new(),
            next_id,
        }
    }

    /// Current round.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Every unit.
    #[must_use]
    pub fn units(&self) -> &[UnitRecord] {
        &self.units
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&UnitRecord> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Gold of a side.
    #[must_use]
    pub const fn gold(&self, side: Side) -> i32 {
        self.gold[side.index()]
    }

    /// The navigation grid.
    #[must_use]
    pub const fn grid(&self) -> &NavGrid {
        &self.grid
    }

    /// Every order issued so far.
    #[must_use]
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Route subsequent orders as coming from `side`.
    pub fn begin_turn(&mut self, side: Side) {
        self.active = side;
    }

    /// What `side` sees this round: its own units and whatever lies inside
    /// their vision.
    #[must_use]
    pub fn snapshot(&self, side: Side) -> Snapshot {
        let watchers: Vec<&UnitRecord> = self
            .units
            .iter()
            .filter(|u| u.side == Some(side) && u.is_alive())
            .collect();
        let visible = self
            .units
            .iter()
            .filter(|u| {
                u.side == Some(side)
                    || watchers
                        .iter()
                        .any(|w| w.position.within(u.position, i64::from(w.vision)))
            })
            .cloned()
            .collect();
        let gold = self.gold(side);
        let holdings: i32 = self
            .units
            .iter()
            .filter(|u| u.side == Some(side))
            .filter_map(|u| self.rules.hire_cost(u.kind))
            .sum();
        let economy = Economy {
            gold,
            committed: 0,
            assets: gold + holdings,
        };
        Snapshot::new(self.round, side, visible, self.heights.clone(), economy)
    }

    /// Apply this round's moves and hires, tick cooldowns and start the next
    /// round.
    pub fn advance(&mut self) {
        for (id, order) in std::mem::take(&mut self.moves) {
            let Some(index) = self.units.iter().position(|u| u.id == id) else {
                continue;
            };
            let unit = &self.units[index];
            let landing = self.step(unit.position, unit.speed, &order);
            self.units[index].position = landing;
        }

        for (side, kind) in std::mem::take(&mut self.hires) {
            let id = self.next_id;
            self.next_id += 1;
            let home = self.homes[side.index()];
            let record = spawn_record(id, Some(side), kind, home, UnitStats::for_kind(kind));
            tracing::debug!(unit = id, ?side, ?kind, "Hero spawned at base");
            self.units.push(record);
        }

        for unit in &mut self.units {
            for ability in &mut unit.abilities {
                ability.cooldown = ability.cooldown.saturating_sub(1);
            }
            if unit.is_alive() {
                unit.mp = (unit.mp + unit.mp_regen).min(unit.max_mp);
                unit.hp = (unit.hp + unit.hp_regen).min(unit.max_hp);
            }
        }

        self.ordered.clear();
        self.round += 1;
    }

    /// Where a unit at `from` ends up after following `order` for a round.
    fn step(&self, from: GridPos, speed: i32, order: &Order) -> GridPos {
        let Order::Move { to, route } = order else {
            return from;
        };
        let reach = i64::from(speed.max(0));
        let target = match route {
            Route::Shortest => *to,
            // Farthest waypoint still within one step, else head for the next.
            Route::HazardAware { waypoints } => {
                let mut target = waypoints.first().copied().unwrap_or(*to);
                for &w in waypoints {
                    if !from.within(w, reach) {
                        break;
                    }
                    target = w;
                }
                target
            }
        };
        if from.within(target, reach) {
            return if self.grid.is_walkable(target) { target } else { from };
        }
        let here = from.to_fixed();
        let delta = (target.to_fixed() - here).with_length(root(speed));
        let mut landing = (here + delta).round_to_grid();
        if !from.within(landing, reach) {
            landing = GridPos::new(
                from.x + delta.x.round_to_zero().to_num::<i32>(),
                from.y + delta.y.round_to_zero().to_num::<i32>(),
            );
        }
        if self.grid.is_walkable(landing) {
            landing
        } else {
            from
        }
    }

    fn reject(&self, unit: EntityId, reason: impl Into<String>) -> TacticsError {
        let reason = reason.into();
        tracing::warn!(round = self.round, unit, %reason, "Order rejected");
        TacticsError::CommandRejected { unit, reason }
    }
}

impl CommandSink for MovementWorld {
    fn issue(&mut self, unit: EntityId, order: Order) -> Result<()> {
        let Some(record) = self.unit(unit) else {
            return Err(self.reject(unit, "unknown unit"));
        };
        if record.side != Some(self.active) {
            return Err(self.reject(unit, "unit belongs to another side"));
        }
        if !self.ordered.insert(unit) {
            return Err(self.reject(unit, format!("second order in round {}", self.round)));
        }
        if matches!(order, Order::Move { .. }) {
            self.moves.push((unit, order.clone()));
        }
        self.log.push(LogEntry::Unit {
            round: self.round,
            side: self.active,
            unit,
            order,
        });
        Ok(())
    }

    fn issue_side(&mut self, order: SideOrder) -> Result<()> {
        if let SideOrder::Hire(kind) = order {
            let slot = self.active.index();
            match self.rules.hire_cost(kind) {
                Some(cost) if cost <= self.gold[slot] => {
                    self.gold[slot] -= cost;
                    self.hires.push((self.active, kind));
                }
                _ => {
                    tracing::warn!(round = self.round, side = ?self.active, ?kind, "Hire refused, not enough gold");
                }
            }
        }
        self.log.push(LogEntry::Side {
            round: self.round,
            side: self.active,
            order,
        });
        Ok(())
    }
}
