//! Tunable constants, loaded from RON.
//!
//! Every weight and threshold the decision core uses lives here. `Default`
//! carries the tuned values, so a config file only needs the fields it
//! changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticsError};
use crate::math::GridPos;
use crate::snapshot::{Side, UnitKind};

/// Complete configuration for one decision core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Scoring weights.
    pub scoring: ScoringWeights,
    /// Behavior thresholds.
    pub thresholds: Thresholds,
    /// Game rule constants.
    pub rules: GameRules,
    /// Map layout.
    pub layout: MapLayout,
    /// Wall-clock budget per round in milliseconds.
    pub round_budget_ms: u64,
    /// Seed for every random choice.
    pub seed: u64,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringWeights::default(),
            thresholds: Thresholds::default(),
            rules: GameRules::default(),
            layout: MapLayout::default(),
            round_budget_ms: 100,
            seed: 0x5eed,
        }
    }
}

impl TacticsConfig {
    /// Load a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| TacticsError::ConfigRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_ron_str(&contents)?;
        tracing::debug!(path = %path.display(), "Loaded tactics config");
        Ok(config)
    }

    /// Parse a config from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self =
            ron::from_str(ron).map_err(|e| TacticsError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject layouts the core cannot operate on.
    pub fn validate(&self) -> Result<()> {
        if self.layout.map_size <= 0 {
            return Err(TacticsError::ConfigParse(format!(
                "map_size must be positive, got {}",
                self.layout.map_size
            )));
        }
        if self.layout.sites.is_empty() {
            return Err(TacticsError::ConfigParse(
                "layout needs at least one mining site".to_string(),
            ));
        }
        Ok(())
    }
}

/// Weights of the scoring model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Hit points in strength.
    pub hp_strength: f64,
    /// Hit point regeneration in strength.
    pub hp_rate_strength: f64,
    /// Mana in strength.
    pub mp_strength: f64,
    /// Mana regeneration in strength.
    pub mp_rate_strength: f64,
    /// Attack in strength.
    pub atk_strength: f64,
    /// Defense in strength.
    pub def_strength: f64,
    /// Speed in strength.
    pub speed_strength: f64,
    /// Down-weight of a ward's hit points.
    pub ward_rate: f64,
    /// Hit points in value.
    pub hp_value: f64,
    /// Defense in value.
    pub def_value: f64,
    /// Attack in value.
    pub atk_value: f64,
    /// Mana in value.
    pub mp_value: f64,
    /// Per covering own unit in value.
    pub cover_value: f64,
    /// Value multiplier on stunned targets.
    pub stunned_rate: f64,
    /// Value multiplier on targets awaiting revive.
    pub awaiting_revive_rate: f64,
    /// Value multiplier on undying targets.
    pub undying_value_rate: f64,
    /// Value multiplier on mining targets.
    pub mining_rate: f64,
    /// Danger multiplier on undying units.
    pub undying_danger_rate: f64,
    /// Strength to danger.
    pub danger_factor: f64,
    /// Strength to ability.
    pub ability_factor: f64,
    /// Saturation scale of summed squad/cluster scores.
    pub aggregate_scale: f64,
    /// Saturation scale of hp x def in value.
    pub value_scale: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            hp_strength: 1.0,
            hp_rate_strength: 2.0,
            mp_strength: 0.2,
            mp_rate_strength: 0.1,
            atk_strength: 1.5,
            def_strength: 0.7,
            speed_strength: 0.5,
            ward_rate: 0.1,
            hp_value: 1.0,
            def_value: 0.9,
            atk_value: 1.0,
            mp_value: 0.1,
            cover_value: 2.5,
            stunned_rate: 1.5,
            awaiting_revive_rate: 5.0,
            undying_value_rate: 8.0,
            mining_rate: 1.5,
            undying_danger_rate: 8.0,
            danger_factor: 1.0,
            ability_factor: 1.0,
            aggregate_scale: 200.0,
            value_scale: 5000.0,
        }
    }
}

/// Thresholds that switch behaviors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Squad or unit health below which it retreats.
    pub retreat_health: f64,
    /// Surround ratio below which a squad retreats.
    pub retreat_surround: f64,
    /// Surround ratio below which a squad asks for reinforcement.
    pub reinforce_surround: f64,
    /// Squad size to start a base assault.
    pub assault_new: usize,
    /// Squad size to keep a base assault going.
    pub assault_current: usize,
    /// Squad size to start an assault while alarmed.
    pub alarm_assault_new: usize,
    /// Squad size to keep an assault going while alarmed.
    pub alarm_assault_current: usize,
    /// Squad size to start contesting a site.
    pub contest_new: usize,
    /// Squad size to keep contesting a site.
    pub contest_current: usize,
    /// Contention factor a site must exceed.
    pub claim_threshold: f64,
    /// Fraction of `claim_threshold` below which a held claim is dropped.
    pub claim_release_ratio: f64,
    /// Distance discount in the contention factor.
    pub contest_distance_factor: f64,
    /// Energy above which a site is worth contesting on its own.
    pub site_energy_threshold: i32,
    /// Remembered enemies per squad member an unseen site may hold.
    pub enemies_per_member: f64,
    /// Squared centroid distance within which squads merge.
    pub join_dist2: i64,
    /// Squared adjacency radius of threat clustering.
    pub hostile_join_dist2: i64,
    /// Squared radius around home searched when idle.
    pub search_radius2: i64,
    /// Squared radius around home that raises the alarm.
    pub alarm_radius2: i64,
    /// Rounds the alarm stays raised.
    pub alarm_rounds: u32,
    /// Rounds an enemy sighting is remembered.
    pub memory_rounds: u32,
    /// Squared distance within which reinforcements engage directly.
    pub reinforce_engage_dist2: i64,
    /// Gold to assets ratio above which heroes are hired.
    pub purchase_ratio: f64,
    /// Squared distance at which a scout counts as arrived.
    pub scout_arrive_dist2: i64,
    /// Buy back only units with more revive rounds left than this.
    pub buyback_min_rounds: i32,
    /// Manhattan radius blocked around a remembered enemy.
    pub hazard_radius: i32,
    /// Cells within this squared distance of the destination stay open.
    pub hazard_clear_dist2: i64,
    /// Inside `hazard_clear_dist2`, cells farther than this may still be blocked.
    pub hazard_inner_dist2: i64,
    /// Squared distance to the enemy that blocks an inner cell.
    pub hazard_core_dist2: i64,
    /// A hazard-aware path ending this far (squared) from its goal is discarded.
    pub hazard_fallback_dist2: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            retreat_health: 0.2,
            retreat_surround: 0.2,
            reinforce_surround: 1.2,
            assault_new: 6,
            assault_current: 2,
            alarm_assault_new: 4,
            alarm_assault_current: 0,
            contest_new: 3,
            contest_current: 2,
            claim_threshold: 0.2,
            claim_release_ratio: 0.8,
            contest_distance_factor: 0.1,
            site_energy_threshold: 25,
            enemies_per_member: 1.25,
            join_dist2: 225,
            hostile_join_dist2: 169,
            search_radius2: 1225,
            alarm_radius2: 2209,
            alarm_rounds: 5,
            memory_rounds: 30,
            reinforce_engage_dist2: 225,
            purchase_ratio: 0.1,
            scout_arrive_dist2: 64,
            buyback_min_rounds: 5,
            hazard_radius: 15,
            hazard_clear_dist2: 400,
            hazard_inner_dist2: 200,
            hazard_core_dist2: 100,
            hazard_fallback_dist2: 16,
        }
    }
}

/// Game rule constants the core relies on. Ranges are squared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Threat range of a tank.
    pub tank_range: i32,
    /// Threat range of a caster.
    pub caster_range: i32,
    /// Threat range of a berserker.
    pub berserker_range: i32,
    /// Threat range of a scout.
    pub scout_range: i32,
    /// Threat range of a neutral monster.
    pub monster_range: i32,
    /// Stun cast range.
    pub stun_range: i32,
    /// Stun mana cost.
    pub stun_mp: i32,
    /// Blink distance.
    pub blink_range: i32,
    /// Blink mana cost.
    pub blink_mp: i32,
    /// Sacrifice mana cost.
    pub sacrifice_mp: i32,
    /// Ward placement range.
    pub ward_range: i32,
    /// Ward mana cost.
    pub ward_mp: i32,
    /// Range within which a unit mines a site.
    pub mining_range: i32,
    /// Range of the caster's heal; casters stay within half of it.
    pub heal_range: i32,
    /// Scout vision.
    pub scout_vision: i32,
    /// Base auto-attack range.
    pub base_range: i32,
    /// Base vision.
    pub base_view: i32,
    /// Range around home within which units can level up.
    pub level_up_range: i32,
    /// Hire cost of a tank.
    pub tank_cost: i32,
    /// Hire cost of a caster.
    pub caster_cost: i32,
    /// Hire cost of a berserker.
    pub berserker_cost: i32,
    /// Hire cost of a scout.
    pub scout_cost: i32,
    /// Level-up cost per current level.
    pub level_up_cost_per_level: i32,
    /// Level-up base cost.
    pub level_up_cost_base: i32,
    /// Buy-back cost per level.
    pub buyback_cost_per_level: i32,
    /// Buy-back base cost.
    pub buyback_cost_base: i32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            tank_range: 9,
            caster_range: 49,
            berserker_range: 9,
            scout_range: 25,
            monster_range: 16,
            stun_range: 16,
            stun_mp: 50,
            blink_range: 100,
            blink_mp: 40,
            sacrifice_mp: 50,
            ward_range: 100,
            ward_mp: 20,
            mining_range: 16,
            heal_range: 64,
            scout_vision: 144,
            base_range: 256,
            base_view: 400,
            level_up_range: 256,
            tank_cost: 300,
            caster_cost: 300,
            berserker_cost: 300,
            scout_cost: 200,
            level_up_cost_per_level: 100,
            level_up_cost_base: 100,
            buyback_cost_per_level: 50,
            buyback_cost_base: 100,
        }
    }
}

impl GameRules {
    /// Range within which a unit of this kind threatens others.
    #[must_use]
    pub const fn threat_range(&self, kind: UnitKind) -> Option<i32> {
        match kind {
            UnitKind::Tank => Some(self.tank_range),
            UnitKind::Caster => Some(self.caster_range),
            UnitKind::Berserker => Some(self.berserker_range),
            UnitKind::Scout => Some(self.scout_range),
            UnitKind::Monster => Some(self.monster_range),
            _ => None,
        }
    }

    /// Hire cost of a hero kind.
    #[must_use]
    pub const fn hire_cost(&self, kind: UnitKind) -> Option<i32> {
        match kind {
            UnitKind::Tank => Some(self.tank_cost),
            UnitKind::Caster => Some(self.caster_cost),
            UnitKind::Berserker => Some(self.berserker_cost),
            UnitKind::Scout => Some(self.scout_cost),
            _ => None,
        }
    }

    /// Cost of raising a unit from `level` to `level + 1`.
    #[must_use]
    pub const fn level_up_cost(&self, level: u32) -> i32 {
        self.level_up_cost_per_level * level as i32 + self.level_up_cost_base
    }

    /// Cost of buying back a unit of `level`.
    #[must_use]
    pub const fn buyback_cost(&self, level: u32) -> i32 {
        self.buyback_cost_per_level * level as i32 + self.buyback_cost_base
    }
}

/// Static map layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapLayout {
    /// Square map edge length.
    pub map_size: i32,
    /// Base of each side, indexed by [`Side::index`].
    pub bases: [GridPos; 2],
    /// Mining sites. Site 0 is the rich central one; the last two are corner
    /// sites the scouts skip.
    pub sites: Vec<GridPos>,
    /// Half-width of the blocked square around a site.
    pub site_footprint: i32,
    /// Length of a match in rounds.
    pub max_rounds: u32,
}

impl Default for MapLayout {
    fn default() -> Self {
        Self {
            map_size: 150,
            bases: [GridPos::new(10, 10), GridPos::new(140, 140)],
            sites: vec![
                GridPos::new(75, 75),
                GridPos::new(75, 30),
                GridPos::new(75, 120),
                GridPos::new(30, 75),
                GridPos::new(120, 75),
                GridPos::new(20, 130),
                GridPos::new(130, 20),
            ],
            site_footprint: 2,
            max_rounds: 500,
        }
    }
}

impl MapLayout {
    /// Home base of a side.
    #[must_use]
    pub const fn home(&self, side: Side) -> GridPos {
        self.bases[side.index()]
    }

    /// Base of the opposing side.
    #[must_use]
    pub const fn enemy_base(&self, side: Side) -> GridPos {
        self.bases[side.opponent().index()]
    }

    /// The rich central site.
    #[must_use]
    pub fn central_site(&self) -> Option<GridPos> {
        self.sites.first().copied()
    }

    /// Sites scouts may be sent to (all but the two corner sites).
    #[must_use]
    pub fn scoutable_sites(&self) -> &[GridPos] {
        let end = self.sites.len().saturating_sub(2);
        &self.sites[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = TacticsConfig::default();
        assert_eq!(config.round_budget_ms, 100);
        assert_eq!(config.thresholds.hostile_join_dist2, 169);
        assert!((config.scoring.cover_value - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.layout.scoutable_sites().len(), 5);
    }

    #[test]
    fn test_partial_ron_overrides() {
        let ron = r"(
            thresholds: (retreat_health: 0.3),
            seed: 42,
        )";
        let config = TacticsConfig::from_ron_str(ron).unwrap();
        assert!((config.thresholds.retreat_health - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.thresholds.join_dist2, 225);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let ron = "(layout: (map_size: 0))";
        assert!(matches!(
            TacticsConfig::from_ron_str(ron),
            Err(TacticsError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(TacticsConfig::from_ron_str("(seed: \"nope\")").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = TacticsConfig::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, TacticsError::ConfigRead { .. }));
    }

    #[test]
    fn test_cost_curves() {
        let rules = GameRules::default();
        assert_eq!(rules.level_up_cost(2), 300);
        assert_eq!(rules.buyback_cost(3), 250);
        assert_eq!(rules.hire_cost(UnitKind::Ward), None);
        assert_eq!(rules.threat_range(UnitKind::Monster), Some(16));
    }

    #[test]
    fn test_bases_per_side() {
        let layout = MapLayout::default();
        assert_eq!(layout.home(Side::First), layout.enemy_base(Side::Second));
    }
}
