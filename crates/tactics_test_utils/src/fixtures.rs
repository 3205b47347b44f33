//! Test fixtures and helpers.
//!
//! Pre-built units and snapshots for consistent testing. Stats are loosely
//! modeled on the default game rules: ranges, vision and speed are squared.

use tactics_core::config::TacticsConfig;
use tactics_core::math::GridPos;
use tactics_core::pathing::NavGrid;
use tactics_core::snapshot::{
    Ability, AbilityState, Economy, Effect, EntityId, HeightMap, Side, Snapshot, StatusEffect,
    UnitKind, UnitRecord,
};

/// Edge length of the default test map.
pub const MAP_SIZE: i32 = 150;

fn ready(ability: Ability, max_cooldown: u32) -> AbilityState {
    AbilityState {
        ability,
        cooldown: 0,
        max_cooldown,
    }
}

/// A full-health hero of `kind` at `(x, y)` with every ability ready.
///
/// Non-hero kinds get plain combat stats and only a basic attack.
#[must_use]
pub fn hero(id: EntityId, side: Side, kind: UnitKind, x: i32, y: i32) -> UnitRecord {
    let (hp, mp, attack, defense, speed, vision, range, special) = match kind {
        UnitKind::Tank => (300, 100, 15, 10, 4, 64, 9, Some(Ability::Stun)),
        UnitKind::Caster => (150, 100, 12, 3, 4, 100, 49, Some(Ability::Blink)),
        UnitKind::Berserker => (250, 100, 30, 5, 9, 64, 9, Some(Ability::Sacrifice)),
        UnitKind::Scout => (120, 100, 8, 3, 16, 144, 25, Some(Ability::PlaceWard)),
        _ => (100, 0, 10, 5, 4, 64, 9, None),
    };
    let mut abilities = vec![ready(Ability::Attack, 1)];
    abilities.extend(special.map(|a| ready(a, 10)));
    UnitRecord {
        id,
        side: Some(side),
        kind,
        position: GridPos::new(x, y),
        hp,
        max_hp: hp,
        hp_regen: 1,
        mp,
        max_mp: mp,
        mp_regen: 2,
        attack,
        defense,
        speed,
        vision,
        range,
        abilities,
        ..UnitRecord::default()
    }
}

/// A neutral mining site holding `energy`.
#[must_use]
pub fn site(id: EntityId, x: i32, y: i32, energy: i32) -> UnitRecord {
    UnitRecord {
        id,
        kind: UnitKind::Site,
        position: GridPos::new(x, y),
        hp: 1000,
        max_hp: 1000,
        energy: Some(energy),
        ..UnitRecord::default()
    }
}

/// A neutral monster.
#[must_use]
pub fn monster(id: EntityId, x: i32, y: i32) -> UnitRecord {
    UnitRecord {
        id,
        kind: UnitKind::Monster,
        position: GridPos::new(x, y),
        hp: 200,
        max_hp: 200,
        attack: 20,
        defense: 8,
        speed: 1,
        vision: 36,
        range: 16,
        abilities: vec![ready(Ability::Attack, 1)],
        ..UnitRecord::default()
    }
}

/// A side's base at its default position.
#[must_use]
pub fn base(id: EntityId, side: Side) -> UnitRecord {
    let layout = TacticsConfig::default().layout;
    UnitRecord {
        id,
        side: Some(side),
        kind: UnitKind::Base,
        position: layout.home(side),
        hp: 5000,
        max_hp: 5000,
        attack: 50,
        defense: 30,
        vision: 400,
        range: 256,
        ..UnitRecord::default()
    }
}

/// Set hit points, keeping the maximum.
#[must_use]
pub fn with_hp(mut unit: UnitRecord, hp: i32) -> UnitRecord {
    unit.hp = hp;
    unit
}

/// Add an effect with `remaining` rounds.
#[must_use]
pub fn with_effect(mut unit: UnitRecord, effect: Effect, remaining: i32) -> UnitRecord {
    unit.effects.push(StatusEffect { effect, remaining });
    unit
}

/// Put an ability on cooldown, adding it if absent.
#[must_use]
pub fn with_cooldown(mut unit: UnitRecord, ability: Ability, cooldown: u32) -> UnitRecord {
    match unit.abilities.iter_mut().find(|a| a.ability == ability) {
        Some(state) => state.cooldown = cooldown,
        None => unit.abilities.push(AbilityState {
            ability,
            cooldown,
            max_cooldown: cooldown,
        }),
    }
    unit
}

/// An open navigation grid the size of the default map.
#[must_use]
pub fn open_grid() -> NavGrid {
    NavGrid::open(MAP_SIZE, MAP_SIZE)
}

/// Builder for [`Snapshot`]s.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    round: u32,
    side: Side,
    units: Vec<UnitRecord>,
    heights: HeightMap,
    economy: Economy,
}

impl SnapshotBuilder {
    /// Round 1 for `side` on a flat default-size map with no gold.
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            round: 1,
            side,
            units: Vec::new(),
            heights: HeightMap::flat(MAP_SIZE, MAP_SIZE),
            economy: Economy::default(),
        }
    }

    /// Set the round.
    #[must_use]
    pub fn round(mut self, round: u32) -> Self {
        self.round = round;
        self
    }

    /// Add a unit.
    #[must_use]
    pub fn unit(mut self, unit: UnitRecord) -> Self {
        self.units.push(unit);
        self
    }

    /// Add several units.
    #[must_use]
    pub fn units(mut self, units: impl IntoIterator<Item = UnitRecord>) -> Self {
        self.units.extend(units);
        self
    }

    /// Set the economy.
    #[must_use]
    pub fn economy(mut self, gold: i32, committed: i32, assets: i32) -> Self {
        self.economy = Economy {
            gold,
            committed,
            assets,
        };
        self
    }

    /// Replace the height map.
    #[must_use]
    pub fn heights(mut self, heights: HeightMap) -> Self {
        self.heights = heights;
        self
    }

    /// Finish the snapshot.
    #[must_use]
    pub fn build(self) -> Snapshot {
        Snapshot::new(self.round, self.side, self.units, self.heights, self.economy)
    }
}
