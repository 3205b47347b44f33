//! Scenario loading and configuration.
//!
//! Scenarios define the starting state of a headless match: terrain, the
//! units of both sides and the neutrals, starting gold and how many rounds
//! to play.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tactics_core::error::TacticsError;
use tactics_core::math::GridPos;
use tactics_core::snapshot::{
    Ability, AbilityState, EntityId, HeightMap, Side, UnitKind, UnitRecord,
};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario parsed but cannot be played.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    /// The tactics config referenced by the scenario failed to load.
    #[error("Scenario config: {0}")]
    Config(#[from] TacticsError),
}

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Rounds to play.
    pub rounds: u32,
    /// Overrides the config seed when set.
    pub seed: Option<u64>,
    /// Tactics config file, relative to the scenario file.
    pub config: Option<String>,
    /// Height rows; empty means flat.
    pub heights: Vec<Vec<i32>>,
    /// Impassable cells.
    pub walls: Vec<(i32, i32)>,
    /// Starting gold of (first, second).
    pub gold: (i32, i32),
    /// Every unit on the map at round 1.
    pub units: Vec<UnitPlacement>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Empty".to_string(),
            description: String::new(),
            rounds: 50,
            seed: None,
            config: None,
            heights: Vec::new(),
            walls: Vec::new(),
            gold: (0, 0),
            units: Vec::new(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario = Self::from_ron_str(&contents)?;
        tracing::debug!(path = %path.display(), name = %scenario.name, "Loaded scenario");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reject scenarios the runner cannot play.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.rounds == 0 {
            return Err(ScenarioError::Invalid("rounds must be positive".to_string()));
        }
        let mut ids = HashSet::new();
        for unit in &self.units {
            if !ids.insert(unit.id) {
                return Err(ScenarioError::Invalid(format!("duplicate unit id {}", unit.id)));
            }
            if UnitKind::from_tag(&unit.kind) == UnitKind::Other {
                return Err(ScenarioError::Invalid(format!(
                    "unit {} has unknown kind '{}'",
                    unit.id, unit.kind
                )));
            }
        }
        Ok(())
    }

    /// Terrain for a map of `size` cells per side.
    #[must_use]
    pub fn height_map(&self, size: i32) -> HeightMap {
        if self.heights.is_empty() {
            HeightMap::flat(size, size)
        } else {
            HeightMap::from_rows(&self.heights)
        }
    }

    /// Starting gold of a side.
    #[must_use]
    pub const fn starting_gold(&self, side: Side) -> i32 {
        match side {
            Side::First => self.gold.0,
            Side::Second => self.gold.1,
        }
    }

    /// A small mirrored 4v4 on the default layout.
    #[must_use]
    pub fn skirmish() -> Self {
        let mut units = vec![
            UnitPlacement::new(1, Some(Side::First), "base", 10, 10),
            UnitPlacement::new(2, Some(Side::First), "tank", 20, 18),
            UnitPlacement::new(3, Some(Side::First), "caster", 18, 20),
            UnitPlacement::new(4, Some(Side::First), "berserker", 22, 22),
            UnitPlacement::new(5, Some(Side::First), "scout", 16, 16),
            UnitPlacement::new(11, Some(Side::Second), "base", 140, 140),
            UnitPlacement::new(12, Some(Side::Second), "tank", 130, 132),
            UnitPlacement::new(13, Some(Side::Second), "caster", 132, 130),
            UnitPlacement::new(14, Some(Side::Second), "berserker", 128, 128),
            UnitPlacement::new(15, Some(Side::Second), "scout", 134, 134),
            UnitPlacement::new(31, None, "monster", 75, 60),
        ];
        let sites = [
            (75, 75, 1000),
            (75, 30, 500),
            (75, 120, 500),
            (30, 75, 500),
            (120, 75, 500),
            (20, 130, 300),
            (130, 20, 300),
        ];
        for (i, (x, y, energy)) in sites.into_iter().enumerate() {
            let mut site = UnitPlacement::new(21 + i as EntityId, None, "site", x, y);
            site.stats = Some(UnitStats {
                energy: Some(energy),
                ..UnitStats::for_kind(UnitKind::Site)
            });
            units.push(site);
        }
        Self {
            name: "Skirmish".to_string(),
            description: "Mirrored 4v4 on the default layout".to_string(),
            rounds: 60,
            gold: (600, 600),
            units,
            ..Self::default()
        }
    }
}

/// Combat stats of a placed unit. Distances are squared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitStats {
    /// Hit points.
    pub hp: i32,
    /// Mana.
    pub mp: i32,
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
    /// Mining energy, sites only.
    pub energy: Option<i32>,
}

impl Default for UnitStats {
    fn default() -> Self {
        Self::for_kind(UnitKind::Other)
    }
}

impl UnitStats {
    /// Default stats of a kind.
    #[must_use]
    pub const fn for_kind(kind: UnitKind) -> Self {
        let (hp, mp, attack, defense, speed, vision, range) = match kind {
            UnitKind::Tank => (300, 100, 15, 10, 4, 64, 9),
            UnitKind::Caster => (150, 100, 12, 3, 4, 100, 49),
            UnitKind::Berserker => (250, 100, 30, 5, 9, 64, 9),
            UnitKind::Scout => (120, 100, 8, 3, 16, 144, 25),
            UnitKind::Base => (5000, 0, 50, 30, 0, 400, 256),
            UnitKind::Monster => (200, 0, 20, 8, 1, 36, 16),
            UnitKind::Site => (1000, 0, 0, 0, 0, 0, 0),
            UnitKind::Ward => (50, 0, 0, 2, 0, 100, 0),
            UnitKind::Other => (100, 0, 10, 5, 4, 64, 9),
        };
        let energy = match kind {
            UnitKind::Site => Some(500),
            _ => None,
        };
        Self {
            hp,
            mp,
            attack,
            defense,
            speed,
            vision,
            range,
            energy,
        }
    }
}

/// Placement of a unit at scenario start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit id, unique within the scenario.
    pub id: EntityId,
    /// Owner; `None` for neutrals.
    #[serde(default)]
    pub side: Option<Side>,
    /// Engine type tag, e.g. `"tank"` or `"hammerguard"`.
    pub kind: String,
    /// Position (x, y).
    pub position: (i32, i32),
    /// Stat overrides; defaults for the kind when absent.
    #[serde(default)]
    pub stats: Option<UnitStats>,
}

impl UnitPlacement {
    /// Create a placement with the kind's default stats.
    #[must_use]
    pub fn new(id: EntityId, side: Option<Side>, kind: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            id,
            side,
            kind: kind.into(),
            position: (x, y),
            stats: None,
        }
    }

    /// The unit as the engine would report it at round 1.
    #[must_use]
    pub fn record(&self) -> UnitRecord {
        let kind = UnitKind::from_tag(&self.kind);
        spawn_record(
            self.id,
            self.side,
            kind,
            GridPos::new(self.position.0, self.position.1),
            self.stats.unwrap_or_else(|| UnitStats::for_kind(kind)),
        )
    }
}

/// Build a fresh unit with full health and every ability ready.
#[must_use]
pub fn spawn_record(
    id: EntityId,
    side: Option<Side>,
    kind: UnitKind,
    position: GridPos,
    stats: UnitStats,
) -> UnitRecord {
    let special = match kind {
        UnitKind::Tank => Some(Ability::Stun),
        UnitKind::Caster => Some(Ability::Blink),
        UnitKind::Berserker => Some(Ability::Sacrifice),
        UnitKind::Scout => Some(Ability::PlaceWard),
        _ => None,
    };
    let mut abilities = Vec::new();
    if stats.attack > 0 {
        abilities.push(AbilityState {
            ability: Ability::Attack,
            cooldown: 0,
            max_cooldown: 1,
        });
    }
    abilities.extend(special.map(|ability| AbilityState {
        ability,
        cooldown: 0,
        max_cooldown: 10,
    }));
    let regen = i32::from(kind.is_hero());
    UnitRecord {
        id,
        side,
        kind,
        position,
        hp: stats.hp,
        max_hp: stats.hp,
        hp_regen: regen,
        mp: stats.mp,
        max_mp: stats.mp,
        mp_regen: regen * 2,
        attack: stats.attack,
        defense: stats.defense,
        speed: stats.speed,
        vision: stats.vision,
        range: stats.range,
        energy: stats.energy,
        abilities,
        ..UnitRecord::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skirmish_scenario() {
        let scenario = Scenario::skirmish();
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.rounds, 60);
        let sites = scenario
            .units
            .iter()
            .filter(|u| UnitKind::from_tag(&u.kind) == UnitKind::Site)
            .count();
        assert_eq!(sites, 7);
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "Test",
                rounds: 5,
                seed: Some(9),
                gold: (100, 200),
                units: [
                    UnitPlacement(id: 1, side: Some(First), kind: "hammerguard", position: (3, 4)),
                    UnitPlacement(
                        id: 2,
                        kind: "mine",
                        position: (50, 50),
                        stats: Some(UnitStats(hp: 10, energy: Some(40))),
                    ),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "Test");
        assert_eq!(scenario.seed, Some(9));
        assert_eq!(scenario.starting_gold(Side::Second), 200);

        let tank = scenario.units[0].record();
        assert_eq!(tank.kind, UnitKind::Tank);
        assert_eq!(tank.position, GridPos::new(3, 4));
        assert!(tank.ability_ready(Ability::Stun));

        let site = scenario.units[1].record();
        assert_eq!(site.side, None);
        assert_eq!(site.hp, 10);
        assert_eq!(site.energy, Some(40));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let ron = r#"
            Scenario(units: [
                UnitPlacement(id: 1, kind: "tank", position: (0, 0)),
                UnitPlacement(id: 1, kind: "scout", position: (1, 1)),
            ])
        "#;
        assert!(matches!(
            Scenario::from_ron_str(ron),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let ron = r#"Scenario(units: [UnitPlacement(id: 1, kind: "dragonfly", position: (0, 0))])"#;
        assert!(matches!(
            Scenario::from_ron_str(ron),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Scenario::load("/definitely/not/here.ron");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duel.ron");
        std::fs::write(
            &path,
            r#"Scenario(name: "Duel", rounds: 3, units: [UnitPlacement(id: 7, side: Some(Second), kind: "berserker", position: (9, 9))])"#,
        )
        .unwrap();
        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.name, "Duel");
        assert_eq!(scenario.units[0].record().side, Some(Side::Second));
    }

    #[test]
    fn test_height_map_defaults_flat() {
        let scenario = Scenario::default();
        let heights = scenario.height_map(20);
        assert_eq!(heights.width(), 20);
        assert_eq!(heights.at(GridPos::new(5, 5)), 0);

        let hilly = Scenario {
            heights: vec![vec![0, 1], vec![2, 3]],
            ..Scenario::default()
        };
        assert_eq!(hilly.height_map(20).at(GridPos::new(1, 1)), 3);
    }
}
