//! Multi-factor scoring model.
//!
//! Every score is a pure function of the current snapshot, memoized per
//! (round, side) through [`RoundCache`]. The [`Scorer`] mutates nothing but its
//! own caches. Degenerate inputs (zero maxima, empty groups) give neutral
//! values; NaN never leaves this module.
//!
//! Unit scores:
//! - **strength**: what a unit brings to a fight, scaled by how much of it is left
//! - **danger** / **ability**: strength seen from the enemy's or our side
//! - **value**: how rewarding a hostile is to attack
//!
//! Group scores saturate the sum of their members' unit scores.

use crate::cache::RoundCache;
use crate::clustering::{ClusterId, ClusterSet, ThreatCluster};
use crate::config::{GameRules, ScoringWeights, TacticsConfig};
use crate::math::{nan_to_zero, root, saturate, Fixed, GridPos, Vec2Fixed};
use crate::memory::EnemyMemory;
use crate::snapshot::{Ability, Effect, EntityId, Snapshot, UnitKind, UnitRecord};
use crate::squads::{Squad, SquadKey};

/// Scores units, squads and clusters, caching per round.
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoringWeights,
    rules: GameRules,
    site_energy_threshold: i32,
    enemy_base: [GridPos; 2],
    sites: Vec<GridPos>,
    strength: RoundCache<EntityId, f64>,
    danger: RoundCache<EntityId, f64>,
    value: RoundCache<EntityId, f64>,
    coverage: RoundCache<EntityId, u32>,
    threatened: RoundCache<EntityId, u32>,
    predicted: RoundCache<EntityId, GridPos>,
    squad_health: RoundCache<SquadKey, f64>,
    squad_ability: RoundCache<SquadKey, f64>,
    surround: RoundCache<SquadKey, f64>,
    engaged: RoundCache<SquadKey, Option<ClusterId>>,
    cluster_danger: RoundCache<ClusterId, f64>,
    cluster_value: RoundCache<ClusterId, f64>,
    mine_factor: RoundCache<ClusterId, f64>,
    map_danger: RoundCache<GridPos, f64>,
}

impl Scorer {
    /// Scorer with the weights and rules of `config`.
    #[must_use]
    pub fn new(config: &TacticsConfig) -> Self {
        let layout = &config.layout;
        Self {
            weights: config.scoring.clone(),
            rules: config.rules.clone(),
            site_energy_threshold: config.thresholds.site_energy_threshold,
            // Indexed by our side: the base we are attacking.
            enemy_base: [layout.bases[1], layout.bases[0]],
            sites: layout.sites.clone(),
            strength: RoundCache::new(),
            danger: RoundCache::new(),
            value: RoundCache::new(),
            coverage: RoundCache::new(),
            threatened: RoundCache::new(),
            predicted: RoundCache::new(),
            squad_health: RoundCache::new(),
            squad_ability: RoundCache::new(),
            surround: RoundCache::new(),
            engaged: RoundCache::new(),
            cluster_danger: RoundCache::new(),
            cluster_value: RoundCache::new(),
            mine_factor: RoundCache::new(),
            map_danger: RoundCache::new(),
        }
    }

    /// Number of strength computations so far. Exposed for cache tests.
    #[must_use]
    pub const fn strength_computations(&self) -> u64 {
        self.strength.computations()
    }

    /// Number of value computations so far. Exposed for cache tests.
    #[must_use]
    pub const fn value_computations(&self) -> u64 {
        self.value.computations()
    }

    // ------------------------------------------------------------------
    // Unit scores
    // ------------------------------------------------------------------

    /// Fighting strength of a unit.
    pub fn strength(&mut self, snap: &Snapshot, id: EntityId) -> f64 {
        self.strength.sync(snap.stamp());
        if let Some(v) = self.strength.get(&id) {
            return v;
        }
        let v = snap.unit(id).map_or(0.0, |u| self.compute_strength(u));
        self.strength.insert(id, v)
    }

    fn compute_strength(&self, u: &UnitRecord) -> f64 {
        let w = &self.weights;
        let hp = f64::from(u.hp.max(0));
        let max_hp = f64::from(u.max_hp);
        match u.kind {
            UnitKind::Site => 0.0,
            UnitKind::Ward => {
                let available = hp * w.hp_strength * w.ward_rate;
                let total = max_hp * w.hp_strength;
                let value = f64::from(u.defense) * w.def_strength;
                ratio(value * available, total)
            }
            kind => {
                let hp = if u.has(Effect::Undying) { max_hp } else { hp };
                let mut available = hp * w.hp_strength;
                let mut total = max_hp * w.hp_strength;
                let mut value = f64::from(u.hp_regen) * w.hp_rate_strength;
                if kind.is_hero() {
                    available += f64::from(u.mp.max(0)) * w.mp_strength;
                    total += f64::from(u.max_mp) * w.mp_strength;
                    value += f64::from(u.mp_regen) * w.mp_rate_strength;
                }
                value += f64::from(u.attack) * w.atk_strength + f64::from(u.defense) * w.def_strength;
                if kind != UnitKind::Base {
                    value += f64::from(u.speed) * w.speed_strength;
                }
                ratio(value * available, total)
            }
        }
    }

    /// Threat a unit poses.
    pub fn danger(&mut self, snap: &Snapshot, id: EntityId) -> f64 {
        self.danger.sync(snap.stamp());
        if let Some(v) = self.danger.get(&id) {
            return v;
        }
        let mut v = self.strength(snap, id) * self.weights.danger_factor;
        if snap.unit(id).is_some_and(|u| u.has(Effect::Undying)) {
            v *= self.weights.undying_danger_rate;
        }
        self.danger.insert(id, v)
    }

    /// Contribution of a unit to its squad.
    pub fn ability(&mut self, snap: &Snapshot, id: EntityId) -> f64 {
        self.strength(snap, id) * self.weights.ability_factor
    }

    /// Number of own heroes within their threat range of a hostile.
    pub fn coverage(&mut self, snap: &Snapshot, id: EntityId) -> u32 {
        self.coverage.sync(snap.stamp());
        if let Some(v) = self.coverage.get(&id) {
            return v;
        }
        let v = snap.unit(id).map_or(0, |enemy| {
            snap.own_units()
                .filter(|u| u.is_active())
                .filter(|u| {
                    u.kind.is_hero()
                        && self
                            .rules
                            .threat_range(u.kind)
                            .is_some_and(|r| u.position.within(enemy.position, i64::from(r)))
                })
                .count() as u32
        });
        self.coverage.insert(id, v)
    }

    /// How rewarding a hostile is to attack.
    ///
    /// Decreases as the target's hp x def grows, but stays positive while it
    /// poses any danger.
    pub fn value(&mut self, snap: &Snapshot, id: EntityId) -> f64 {
        self.value.sync(snap.stamp());
        if let Some(v) = self.value.get(&id) {
            return v;
        }
        let v = match snap.unit(id) {
            Some(u) if u.kind != UnitKind::Site => {
                let coverage = f64::from(self.coverage(snap, id));
                self.compute_value(u, coverage)
            }
            _ => 0.0,
        };
        self.value.insert(id, v)
    }

    fn compute_value(&self, u: &UnitRecord, coverage: f64) -> f64 {
        let w = &self.weights;
        let mut danger = 0.0;
        if u.kind != UnitKind::Ward {
            if u.kind.is_hero() {
                danger += f64::from(u.mp.max(0)) * w.mp_value;
            }
            danger += f64::from(u.attack) * w.atk_value + coverage * w.cover_value;
        }
        if u.has(Effect::Stunned) {
            danger *= w.stunned_rate;
        }
        if u.has(Effect::AwaitingRevive) {
            danger *= w.awaiting_revive_rate;
        }
        if u.has(Effect::Undying) {
            danger *= w.undying_value_rate;
        }
        if u.has(Effect::Mining) {
            danger *= w.mining_rate;
        }
        let hp = f64::from(u.hp.max(0)) * w.hp_value;
        let def = f64::from(u.defense) * w.def_value;
        // A target with no hp x def to speak of is as soft as one point of it.
        let bulk = (hp * def).max(1.0);
        ratio(danger, saturate(bulk / w.value_scale))
    }

    /// Health fraction of a unit; undying units count as full.
    #[must_use]
    pub fn unit_health(unit: &UnitRecord) -> f64 {
        if unit.has(Effect::Undying) {
            return 1.0;
        }
        ratio(f64::from(unit.hp.max(0)), f64::from(unit.max_hp))
    }

    // ------------------------------------------------------------------
    // Squad scores
    // ------------------------------------------------------------------

    /// Health fraction of a whole squad.
    pub fn squad_health(&mut self, snap: &Snapshot, squad: &Squad) -> f64 {
        self.squad_health.sync(snap.stamp());
        if let Some(v) = self.squad_health.get(&squad.key()) {
            return v;
        }
        let mut cur = 0.0;
        let mut tot = 0.0;
        for u in squad.members().iter().filter_map(|&id| snap.unit(id)) {
            tot += f64::from(u.max_hp);
            cur += if u.has(Effect::Undying) {
                f64::from(u.max_hp)
            } else {
                f64::from(u.hp.max(0))
            };
        }
        self.squad_health.insert(squad.key(), ratio(cur, tot))
    }

    /// Saturated total ability of a squad.
    pub fn squad_ability(&mut self, snap: &Snapshot, squad: &Squad) -> f64 {
        self.squad_ability.sync(snap.stamp());
        if let Some(v) = self.squad_ability.get(&squad.key()) {
            return v;
        }
        let sum: f64 = squad
            .members()
            .iter()
            .map(|&id| self.ability(snap, id))
            .sum();
        let v = saturate(sum / self.weights.aggregate_scale);
        self.squad_ability.insert(squad.key(), v)
    }

    /// Own ability over the danger of every hostile cluster in view.
    ///
    /// Infinite when no danger is visible.
    pub fn surround(&mut self, snap: &Snapshot, clusters: &ClusterSet, squad: &Squad) -> f64 {
        self.surround.sync(snap.stamp());
        if let Some(v) = self.surround.get(&squad.key()) {
            return v;
        }
        let mut friendly = 0.0;
        let mut hostile = 0.0;
        let mut seen: Vec<ClusterId> = Vec::new();
        for member in squad.members().iter().filter_map(|&id| snap.unit(id)) {
            friendly += self.ability(snap, member.id);
            let in_view: Vec<EntityId> = snap
                .hostiles_within(member.position, i64::from(member.vision))
                .filter(|u| u.kind != UnitKind::Site && !u.is_reviving())
                .map(|u| u.id)
                .collect();
            for enemy in in_view {
                let Some(cid) = clusters.cluster_of(enemy) else {
                    continue;
                };
                if seen.contains(&cid) {
                    continue;
                }
                seen.push(cid);
                if let Some(cluster) = clusters.get(cid) {
                    hostile += cluster
                        .members
                        .iter()
                        .map(|&id| self.danger(snap, id))
                        .sum::<f64>();
                }
            }
        }
        // 0/0 reads as surrounded, not as safe.
        let v = nan_to_zero(friendly / hostile);
        self.surround.insert(squad.key(), v)
    }

    /// The cluster whose member most recently hit a squad member that is
    /// under attack.
    pub fn engaged_cluster(
        &mut self,
        snap: &Snapshot,
        clusters: &ClusterSet,
        memory: &EnemyMemory,
        squad: &Squad,
    ) -> Option<ClusterId> {
        self.engaged.sync(snap.stamp());
        if let Some(v) = self.engaged.get(&squad.key()) {
            return v;
        }
        let mut found = None;
        for member in squad.members().iter().filter_map(|&id| snap.unit(id)) {
            if !member.has(Effect::UnderAttack) {
                continue;
            }
            let attacker = memory
                .recent(snap.round)
                .filter_map(|(id, _)| member.last_hit_by.get(&id).map(|&r| (id, r)))
                .max_by_key(|&(id, r)| (r, std::cmp::Reverse(id)))
                .map(|(id, _)| id);
            if let Some(cid) = attacker.and_then(|a| clusters.cluster_of(a)) {
                found = Some(cid);
                break;
            }
        }
        self.engaged.insert(squad.key(), found)
    }

    // ------------------------------------------------------------------
    // Cluster scores
    // ------------------------------------------------------------------

    /// Saturated total danger of a cluster.
    pub fn cluster_danger(&mut self, snap: &Snapshot, cluster: &ThreatCluster) -> f64 {
        self.cluster_danger.sync(snap.stamp());
        if let Some(v) = self.cluster_danger.get(&cluster.id) {
            return v;
        }
        let sum: f64 = cluster.members.iter().map(|&id| self.danger(snap, id)).sum();
        let v = saturate(sum / self.weights.aggregate_scale);
        self.cluster_danger.insert(cluster.id, v)
    }

    /// Saturated total value of a cluster.
    pub fn cluster_value(&mut self, snap: &Snapshot, cluster: &ThreatCluster) -> f64 {
        self.cluster_value.sync(snap.stamp());
        if let Some(v) = self.cluster_value.get(&cluster.id) {
            return v;
        }
        let sum: f64 = cluster.members.iter().map(|&id| self.value(snap, id)).sum();
        let v = saturate(sum / self.weights.aggregate_scale);
        self.cluster_value.insert(cluster.id, v)
    }

    /// 1 when the cluster holds a site worth mining, else 0.
    pub fn mine_factor(&mut self, snap: &Snapshot, cluster: &ThreatCluster) -> f64 {
        self.mine_factor.sync(snap.stamp());
        if let Some(v) = self.mine_factor.get(&cluster.id) {
            return v;
        }
        let reach = i64::from(self.rules.mining_range) * 4;
        let worth = cluster
            .records(snap)
            .filter(|u| u.kind == UnitKind::Site)
            .any(|site| {
                let energy = site.energy.unwrap_or(0);
                energy > self.site_energy_threshold
                    || (energy > 0
                        && snap
                            .own_within(site.position, reach)
                            .any(|u| u.kind != UnitKind::Ward))
            });
        self.mine_factor
            .insert(cluster.id, if worth { 1.0 } else { 0.0 })
    }

    // ------------------------------------------------------------------
    // Positional scores
    // ------------------------------------------------------------------

    /// How exposed a point is: grows toward the enemy base and mining sites.
    ///
    /// Only meaningful relative to other points.
    pub fn map_danger(&mut self, snap: &Snapshot, point: GridPos) -> f64 {
        self.map_danger.sync(snap.stamp());
        if let Some(v) = self.map_danger.get(&point) {
            return v;
        }
        let enemy_base = self.enemy_base[snap.side.index()];
        let mut tot = 2.0 / (point.dist2(enemy_base) as f64).powf(0.1);
        for site in &self.sites {
            tot += 0.7 / (point.dist2(*site) as f64).powf(0.2);
        }
        let v = nan_to_zero(4.0 * saturate(tot.powi(3) / 2.0).ln());
        self.map_danger.insert(point, v)
    }

    /// Where a hostile will likely be next round.
    pub fn predicted_position(
        &mut self,
        snap: &Snapshot,
        clusters: &ClusterSet,
        id: EntityId,
    ) -> GridPos {
        self.predicted.sync(snap.stamp());
        if let Some(v) = self.predicted.get(&id) {
            return v;
        }
        let v = snap
            .unit(id)
            .map_or(GridPos::default(), |enemy| predict(snap, clusters, enemy));
        self.predicted.insert(id, v)
    }

    /// Whether `enemy` can land `ability` on `target` this round.
    #[must_use]
    pub fn ready_to_strike(
        snap: &Snapshot,
        enemy: &UnitRecord,
        target: &UnitRecord,
        ability: Ability,
        range: i32,
    ) -> bool {
        let stun = enemy.effect(Effect::Stunned).map_or(-1, |e| e.remaining);
        if stun >= 1 {
            return false;
        }
        let mut cooldown = enemy.cooldown(ability).map_or(100, i64::from);
        if stun == 0 && cooldown == 0 {
            cooldown = 1;
        }
        if cooldown > 0 {
            return false;
        }
        let cycle = enemy
            .ability(Ability::Attack)
            .map_or(0, |a| a.max_cooldown);
        if let Some(&hit) = target.last_hit_by.get(&enemy.id) {
            if hit + cycle >= snap.round {
                return true;
            }
        }
        let crowd = snap
            .own_within(enemy.position, i64::from(range))
            .filter(|u| u.kind != UnitKind::Site)
            .count();
        crowd <= 2
    }

    /// Number of hostiles that can strike an own unit this round.
    pub fn threatened_by(&mut self, snap: &Snapshot, id: EntityId) -> u32 {
        self.threatened.sync(snap.stamp());
        if let Some(v) = self.threatened.get(&id) {
            return v;
        }
        let Some(me) = snap.unit(id) else {
            return self.threatened.insert(id, 0);
        };
        let mut count = 0;
        for enemy in snap.hostile_units().filter(|u| u.is_active()) {
            let Some(reach) = self.rules.threat_range(enemy.kind) else {
                continue;
            };
            if enemy.position.within(me.position, i64::from(reach))
                && Self::ready_to_strike(snap, enemy, me, Ability::Attack, enemy.range)
            {
                count += 1;
            }
            if enemy.kind == UnitKind::Tank
                && enemy
                    .position
                    .within(me.position, i64::from(self.rules.stun_range))
                && Self::ready_to_strike(snap, enemy, me, Ability::Stun, self.rules.stun_range)
            {
                count += 1;
            }
        }
        self.threatened.insert(id, count)
    }
}

/// `num / den` with zero denominators and NaN giving zero.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    nan_to_zero(num / den)
}

fn predict(snap: &Snapshot, clusters: &ClusterSet, enemy: &UnitRecord) -> GridPos {
    let here = enemy.position;
    if enemy.has(Effect::Stunned) {
        return here;
    }
    let engaged = snap
        .own_within(here, i64::from(enemy.range))
        .any(|u| u.kind != UnitKind::Site);
    if engaged {
        return here;
    }

    // Own units this enemy's group can see.
    let watchers: Vec<&UnitRecord> = match clusters.cluster_of(enemy.id).and_then(|c| clusters.get(c)) {
        Some(cluster) => cluster.records(snap).collect(),
        None => vec![enemy],
    };
    let in_sight: Vec<GridPos> = snap
        .own_units()
        .filter(|u| u.is_alive() && u.kind != UnitKind::Site)
        .filter(|u| {
            watchers
                .iter()
                .any(|w| w.position.within(u.position, i64::from(w.vision)))
        })
        .map(|u| u.position)
        .collect();
    if in_sight.is_empty() {
        return here;
    }

    let origin = here.to_fixed();
    let mut step = root(enemy.speed);
    for p in &in_sight {
        step = step.min((p.to_fixed() - origin).length());
    }
    let mut drift = Vec2Fixed::ZERO;
    for p in &in_sight {
        drift = drift + (p.to_fixed() - origin).with_length(step);
    }
    let n = Fixed::from_num(in_sight.len());
    let drift = Vec2Fixed::new(drift.x / n, drift.y / n);
    (origin + drift).round_to_grid()
}
