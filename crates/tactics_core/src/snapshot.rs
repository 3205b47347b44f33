//! Read-only world snapshot handed to the core each round.
//!
//! The adapter builds a [`Snapshot`] from whatever the engine reports. The
//! core only ever reads it; every decision in a round is derived from one
//! snapshot plus the state the [`TacticalContext`](crate::orchestrator::TacticalContext)
//! carries between rounds.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::cache::RoundStamp;
use crate::math::GridPos;

/// Engine-assigned unit identifier.
pub type EntityId = u32;

/// One of the two competing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// First side.
    First,
    /// Second side.
    Second,
}

impl Side {
    /// Index into per-side arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

/// Unit archetype, parsed from the engine's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitKind {
    /// Frontline stunner (`hammerguard`).
    Tank,
    /// Blink-capable support (`master`).
    Caster,
    /// Self-sacrificing melee (`berserker`).
    Berserker,
    /// Ward-placing explorer (`scouter`).
    Scout,
    /// Placed vision unit (`observer`).
    Ward,
    /// Mining resource node (`mine`).
    Site,
    /// Home structure (`militarybase`).
    Base,
    /// Neutral creature (`roshan`, `dragon`).
    Monster,
    /// Anything the core does not model.
    #[default]
    Other,
}

impl UnitKind {
    /// Purchasable kinds in hiring priority order.
    pub const HEROES: [Self; 4] = [Self::Tank, Self::Caster, Self::Berserker, Self::Scout];

    /// Parse an engine type tag. Unknown tags map to [`UnitKind::Other`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "hammerguard" | "tank" => Self::Tank,
            "master" | "caster" => Self::Caster,
            "berserker" => Self::Berserker,
            "scouter" | "scout" => Self::Scout,
            "observer" | "ward" => Self::Ward,
            "mine" | "site" => Self::Site,
            "militarybase" | "base" => Self::Base,
            "roshan" | "dragon" | "monster" => Self::Monster,
            _ => Self::Other,
        }
    }

    /// Whether this kind is a purchasable hero.
    #[must_use]
    pub const fn is_hero(self) -> bool {
        matches!(self, Self::Tank | Self::Caster | Self::Berserker | Self::Scout)
    }

    /// Weight of this kind in a centroid.
    #[must_use]
    pub const fn centroid_weight(self) -> i64 {
        match self {
            Self::Caster => 3,
            _ => 1,
        }
    }
}

/// Status effect kinds the core reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Cannot act (`dizzy`).
    Stunned,
    /// Dead, waiting to be revived (`waitrevive`).
    AwaitingRevive,
    /// Dead and reviving (`reviving`).
    Reviving,
    /// Guaranteed-kill buff (`winordie`).
    Undying,
    /// Currently mining a site.
    Mining,
    /// Took damage this round (`beattacked`).
    UnderAttack,
}

/// An active effect and the rounds it has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Effect kind.
    pub effect: Effect,
    /// Remaining rounds.
    pub remaining: i32,
}

/// Abilities the core can cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    /// Basic attack.
    Attack,
    /// Tank stun (`hammerattack`).
    Stun,
    /// Caster teleport.
    Blink,
    /// Berserker self-sacrifice.
    Sacrifice,
    /// Scout ward placement (`setobserver`).
    PlaceWard,
}

/// Current and maximum cooldown of one ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityState {
    /// Ability.
    pub ability: Ability,
    /// Rounds until usable.
    pub cooldown: u32,
    /// Full cooldown after use.
    pub max_cooldown: u32,
}

/// One entity as reported by the engine.
///
/// `range`, `vision` and `speed` are squared distances, as the engine
/// reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitRecord {
    /// Unit id.
    pub id: EntityId,
    /// Owning side; `None` for neutrals.
    pub side: Option<Side>,
    /// Archetype.
    pub kind: UnitKind,
    /// Hero level.
    pub level: u32,
    /// Grid cell.
    pub position: GridPos,
    /// Hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Hit point regeneration per round.
    pub hp_regen: i32,
    /// Mana.
    pub mp: i32,
    /// Maximum mana.
    pub max_mp: i32,
    /// Mana regeneration per round.
    pub mp_regen: i32,
    /// Attack.
    pub attack: i32,
    /// Defense.
    pub defense: i32,
    /// Squared step length.
    pub speed: i32,
    /// Squared vision radius.
    pub vision: i32,
    /// Squared attack range.
    pub range: i32,
    /// Remaining energy (mining sites only).
    pub energy: Option<i32>,
    /// Active effects.
    pub effects: Vec<StatusEffect>,
    /// Ability cooldowns.
    pub abilities: Vec<AbilityState>,
    /// Attacker id to the last round it hit this unit.
    pub last_hit_by: BTreeMap<EntityId, u32>,
}

impl Default for UnitRecord {
    fn default() -> Self {
        Self {
            id: 0,
            side: None,
            kind: UnitKind::Other,
            level: 1,
            position: GridPos::default(),
            hp: 1,
            max_hp: 1,
            hp_regen: 0,
            mp: 0,
            max_mp: 0,
            mp_regen: 0,
            attack: 0,
            defense: 0,
            speed: 0,
            vision: 0,
            range: 0,
            energy: None,
            effects: Vec::new(),
            abilities: Vec::new(),
            last_hit_by: BTreeMap::new(),
        }
    }
}

impl UnitRecord {
    /// Whether hit points are positive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Active effect of the given kind.
    #[must_use]
    pub fn effect(&self, effect: Effect) -> Option<&StatusEffect> {
        self.effects.iter().find(|e| e.effect == effect)
    }

    /// Whether the effect is active.
    #[must_use]
    pub fn has(&self, effect: Effect) -> bool {
        self.effect(effect).is_some()
    }

    /// Whether the unit is in the reviving state.
    #[must_use]
    pub fn is_reviving(&self) -> bool {
        self.has(Effect::Reviving)
    }

    /// Whether the unit is alive and not reviving.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_alive() && !self.is_reviving()
    }

    /// State of an ability, if the unit has it.
    #[must_use]
    pub fn ability(&self, ability: Ability) -> Option<&AbilityState> {
        self.abilities.iter().find(|a| a.ability == ability)
    }

    /// Current cooldown of an ability.
    #[must_use]
    pub fn cooldown(&self, ability: Ability) -> Option<u32> {
        self.ability(ability).map(|a| a.cooldown)
    }

    /// Whether the unit has the ability and it is off cooldown.
    #[must_use]
    pub fn ability_ready(&self, ability: Ability) -> bool {
        self.cooldown(ability) == Some(0)
    }

    /// Cooldown of the basic attack, zero if unknown.
    #[must_use]
    pub fn attack_cooldown(&self) -> u32 {
        self.cooldown(Ability::Attack).unwrap_or(0)
    }
}

/// Terrain heights, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeightMap {
    width: i32,
    height: i32,
    cells: Vec<i32>,
}

impl HeightMap {
    /// A flat map of the given size.
    #[must_use]
    pub fn flat(width: i32, height: i32) -> Self {
        let len = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            cells: vec![0; len],
        }
    }

    /// Build from rows. Ragged rows are padded with zero.
    #[must_use]
    pub fn from_rows(rows: &[Vec<i32>]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as i32;
        let mut map = Self::flat(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, &h) in row.iter().enumerate() {
                map.cells[y * width as usize + x] = h;
            }
        }
        map
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Height at a cell; zero outside the map.
    #[must_use]
    pub fn at(&self, pos: GridPos) -> i32 {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return 0;
        }
        self.cells[(pos.y * self.width + pos.x) as usize]
    }
}

/// Side economy as the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Economy {
    /// Gold on hand.
    pub gold: i32,
    /// Gold already committed by earlier orders.
    pub committed: i32,
    /// Total asset value (gold plus units).
    pub assets: i32,
}

/// Everything the core knows about the world in one round.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Round number.
    pub round: u32,
    /// The side being controlled.
    pub side: Side,
    /// Every visible unit, own and hostile.
    pub units: Vec<UnitRecord>,
    /// Terrain heights.
    pub heights: HeightMap,
    /// Economy of the controlled side.
    pub economy: Economy,
    index: HashMap<EntityId, usize>,
}

impl Snapshot {
    /// Build a snapshot and its id index.
    #[must_use]
    pub fn new(
        round: u32,
        side: Side,
        units: Vec<UnitRecord>,
        heights: HeightMap,
        economy: Economy,
    ) -> Self {
        let index = units.iter().enumerate().map(|(i, u)| (u.id, i)).collect();
        Self {
            round,
            side,
            units,
            heights,
            economy,
            index,
        }
    }

    /// Cache stamp for this snapshot.
    #[must_use]
    pub const fn stamp(&self) -> RoundStamp {
        RoundStamp {
            round: self.round,
            side: self.side,
        }
    }

    /// Look up a unit by id.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&UnitRecord> {
        self.index.get(&id).map(|&i| &self.units[i])
    }

    /// Whether the unit belongs to the controlled side.
    #[must_use]
    pub fn is_own(&self, unit: &UnitRecord) -> bool {
        unit.side == Some(self.side)
    }

    /// Units of the controlled side.
    pub fn own_units(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.iter().filter(move |u| self.is_own(u))
    }

    /// Every unit not of the controlled side, neutrals included.
    pub fn hostile_units(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.iter().filter(move |u| !self.is_own(u))
    }

    /// Alive own units inside a disc.
    pub fn own_within(&self, center: GridPos, radius2: i64) -> impl Iterator<Item = &UnitRecord> {
        self.own_units()
            .filter(move |u| u.is_alive() && u.position.within(center, radius2))
    }

    /// Alive hostile units inside a disc.
    pub fn hostiles_within(
        &self,
        center: GridPos,
        radius2: i64,
    ) -> impl Iterator<Item = &UnitRecord> {
        self.hostile_units()
            .filter(move |u| u.is_alive() && u.position.within(center, radius2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: EntityId, side: Option<Side>, x: i32, y: i32) -> UnitRecord {
        UnitRecord {
            id,
            side,
            position: GridPos::new(x, y),
            hp: 10,
            max_hp: 10,
            ..UnitRecord::default()
        }
    }

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(UnitKind::from_tag("hammerguard"), UnitKind::Tank);
        assert_eq!(UnitKind::from_tag("Master"), UnitKind::Caster);
        assert_eq!(UnitKind::from_tag("roshan"), UnitKind::Monster);
        assert_eq!(UnitKind::from_tag("dragon"), UnitKind::Monster);
        assert_eq!(UnitKind::from_tag("militarybase"), UnitKind::Base);
        assert_eq!(UnitKind::from_tag("catapult"), UnitKind::Other);
    }

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::First.opponent(), Side::Second);
        assert_eq!(Side::Second.opponent().index(), 0);
    }

    #[test]
    fn test_snapshot_queries() {
        let units = vec![
            record(1, Some(Side::First), 0, 0),
            record(2, Some(Side::Second), 3, 4),
            record(3, None, 10, 10),
        ];
        let snap = Snapshot::new(7, Side::First, units, HeightMap::flat(20, 20), Economy::default());

        assert_eq!(snap.unit(2).map(|u| u.id), Some(2));
        assert!(snap.unit(99).is_none());
        assert_eq!(snap.own_units().count(), 1);
        assert_eq!(snap.hostile_units().count(), 2);
        assert_eq!(snap.hostiles_within(GridPos::new(0, 0), 25).count(), 1);
        assert_eq!(snap.hostiles_within(GridPos::new(0, 0), 24).count(), 0);
    }

    #[test]
    fn test_ability_ready() {
        let mut unit = record(1, Some(Side::First), 0, 0);
        assert!(!unit.ability_ready(Ability::Stun));
        unit.abilities.push(AbilityState {
            ability: Ability::Stun,
            cooldown: 0,
            max_cooldown: 4,
        });
        assert!(unit.ability_ready(Ability::Stun));
        assert_eq!(unit.attack_cooldown(), 0);
    }

    #[test]
    fn test_height_map_bounds() {
        let map = HeightMap::from_rows(&[vec![0, 1], vec![2, 3]]);
        assert_eq!(map.at(GridPos::new(1, 1)), 3);
        assert_eq!(map.at(GridPos::new(5, 5)), 0);
        assert_eq!(map.at(GridPos::new(-1, 0)), 0);
    }
}
