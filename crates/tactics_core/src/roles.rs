//! Per-role decisions: what one unit does when told to attack or move.

use crate::clustering::ClusterId;
use crate::dispatch::{random_point_in_disc, SquadView, Tactician};
use crate::error::Result;
use crate::math::{cos_ahead, cos_behind, root, Fixed, GridPos, Vec2Fixed};
use crate::orders::{AbilityTarget, Order};
use crate::scoring::Scorer;
use crate::snapshot::{Ability, Effect, EntityId, UnitKind, UnitRecord};
use crate::units::Role;

/// Ward placement attempts around a site.
const WARD_SAMPLES: usize = 10;

impl Tactician<'_> {
    /// Order for a unit told to attack a cluster.
    pub(crate) fn decide_attack(&mut self, view: &SquadView, me: &UnitRecord, cluster: ClusterId) -> Result<Order> {
        match self.units.role(me.id) {
            Role::Tank => self.tank_attack(view, me, cluster),
            Role::Caster => self.caster_attack(view, me, cluster),
            Role::Berserker => self.berserker_attack(view, me, cluster),
            Role::Scout => match self.ward_spot(me, None) {
                Some(spot) => Ok(place_ward(spot)),
                None => self.default_attack(view, me, cluster),
            },
            Role::Fighter => self.default_attack(view, me, cluster),
        }
    }

    /// Order for a unit told to move to `dest`.
    pub(crate) fn decide_move(&mut self, view: &SquadView, me: &UnitRecord, dest: GridPos) -> Result<Order> {
        match self.units.role(me.id) {
            Role::Caster => self.caster_move(view, me, dest),
            Role::Scout => match self.ward_spot(me, Some(dest)) {
                Some(spot) => Ok(place_ward(spot)),
                None => self.default_move(view, me, dest),
            },
            _ => self.default_move(view, me, dest),
        }
    }

    fn default_attack(&mut self, view: &SquadView, me: &UnitRecord, cluster: ClusterId) -> Result<Order> {
        let snap = self.snap;
        let clusters = self.clusters;
        let Some(group) = clusters.get(cluster) else {
            return self.move_order(me, view.centroid);
        };
        let cooldown = me.attack_cooldown();
        let reach = {
            let r = root(me.range) + root(me.speed) * Fixed::from_num(cooldown);
            (r * r).to_num::<i64>()
        };
        let skip_monster = |e: &UnitRecord| group.has_hero && e.kind == UnitKind::Monster;

        let mut best: Option<(&UnitRecord, f64)> = None;
        for e in group.records(snap) {
            if e.position.dist2(me.position) > reach
                || matches!(e.kind, UnitKind::Ward | UnitKind::Site)
                || skip_monster(e)
            {
                continue;
            }
            let v = self.scorer.value(snap, e.id);
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((e, v));
            }
        }
        if best.is_none() {
            for e in group.records(snap) {
                if e.kind == UnitKind::Site
                    || skip_monster(e)
                    || (me.range < e.range && e.has(Effect::Undying))
                {
                    continue;
                }
                let v = self.scorer.value(snap, e.id);
                if best.map_or(true, |(_, b)| v > b) {
                    best = Some((e, v));
                }
            }
        }
        let Some((target, _)) = best else {
            return self.move_order(me, view.centroid);
        };
        if cooldown >= 2 {
            return self.move_order(me, view.centroid);
        }

        let predicted = self.scorer.predicted_position(snap, clusters, target.id);
        let strike = root(me.range) * Fixed::from_num(0.8);
        let here = me.position.to_fixed();
        let offset = predicted.to_fixed() - here;
        let dist = offset.length();
        if dist > strike && !target.position.within(me.position, i64::from(me.range)) {
            let feint = (here + offset.scale((dist - strike) / dist)).round_to_grid();
            let landing = self.reachable(me.position, feint)?;
            if Fixed::from_num(landing.dist2(predicted)) <= strike * strike {
                return self.move_order(me, feint);
            }
        }
        Ok(Order::Attack { target: target.id })
    }

    fn default_move(&mut self, view: &SquadView, me: &UnitRecord, dest: GridPos) -> Result<Order> {
        let snap = self.snap;
        let vision = i64::from(me.vision);
        if Scorer::unit_health(me) > self.config.thresholds.retreat_health {
            if let Some(engaged) = view.engaged {
                let ahead = me.position.to_fixed() - view.centroid.to_fixed();
                let heading = dest.to_fixed() - view.centroid.to_fixed();
                let leading = me.position.dist2(view.centroid) * 8 > vision
                    && ahead.cosine(heading).is_some_and(|c| c > cos_ahead());
                if leading {
                    return if self.units.role(me.id) == Role::Caster {
                        self.default_attack(view, me, engaged)
                    } else {
                        self.decide_attack(view, me, engaged)
                    };
                }
            }
            if me.attack_cooldown() == 0 {
                let exposed = snap
                    .hostile_units()
                    .filter(|u| u.is_active() && !matches!(u.kind, UnitKind::Site | UnitKind::Ward))
                    .any(|u| me.position.within(u.position, i64::from(u.range)));
                if !exposed {
                    let candidates: Vec<EntityId> = snap
                        .hostiles_within(me.position, i64::from(me.range))
                        .filter(|u| {
                            !matches!(u.kind, UnitKind::Site | UnitKind::Ward | UnitKind::Monster)
                                && !u.is_reviving()
                        })
                        .map(|u| u.id)
                        .collect();
                    let mut best: Option<(EntityId, f64)> = None;
                    for id in candidates {
                        let v = self.scorer.value(snap, id);
                        if best.map_or(true, |(_, b)| v > b) {
                            best = Some((id, v));
                        }
                    }
                    if let Some((target, _)) = best {
                        return Ok(Order::Attack { target });
                    }
                }
            }
        }

        let mut dest = dest;
        let threatened = snap
            .hostiles_within(me.position, vision * 6 / 5)
            .any(|u| u.kind != UnitKind::Site);
        if threatened {
            let to_centroid = view.centroid.to_fixed() - me.position.to_fixed();
            let heading = dest.to_fixed() - me.position.to_fixed();
            if me.position.dist2(view.centroid) * 4 > vision
                && to_centroid.cosine(heading).is_some_and(|c| c < cos_behind())
            {
                dest = view.centroid;
            }
        }
        self.move_order(me, dest)
    }

    fn tank_attack(&mut self, view: &SquadView, me: &UnitRecord, cluster: ClusterId) -> Result<Order> {
        let snap = self.snap;
        let rules = &self.config.rules;
        if me.mp >= rules.stun_mp && me.ability_ready(Ability::Stun) {
            if let Some(group) = self.clusters.get(cluster) {
                let stun_range = i64::from(rules.stun_range);
                let mut best: Option<(EntityId, f64)> = None;
                for e in group.records(snap) {
                    let stunned = e.effect(Effect::Stunned).is_some_and(|s| s.remaining > 0);
                    if matches!(e.kind, UnitKind::Site | UnitKind::Base | UnitKind::Ward)
                        || stunned
                        || (group.has_hero && e.kind == UnitKind::Monster)
                        || !e.position.within(me.position, stun_range)
                    {
                        continue;
                    }
                    let d = self.scorer.danger(snap, e.id);
                    if best.map_or(true, |(_, b)| d > b) {
                        best = Some((e.id, d));
                    }
                }
                if let Some((target, _)) = best {
                    return Ok(Order::Cast {
                        ability: Ability::Stun,
                        target: AbilityTarget::Unit(target),
                    });
                }
            }
        }
        self.default_attack(view, me, cluster)
    }

    fn caster_attack(&mut self, view: &SquadView, me: &UnitRecord, cluster: ClusterId) -> Result<Order> {
        let snap = self.snap;
        if me.position.dist2(view.centroid) * 2 > i64::from(self.config.rules.heal_range) {
            return self.caster_move(view, me, view.centroid);
        }
        let here = me.position.to_fixed();
        let pressing: Vec<GridPos> = self
            .clusters
            .get(cluster)
            .into_iter()
            .flat_map(|g| g.records(snap))
            .filter(|e| {
                matches!(e.kind, UnitKind::Tank | UnitKind::Berserker)
                    && me.position.within(e.position, i64::from(e.range))
            })
            .map(|e| e.position)
            .collect();
        if !pressing.is_empty() {
            let mut away = pressing
                .iter()
                .fold(Vec2Fixed::ZERO, |acc, p| acc - (p.to_fixed() - here));
            if away.is_zero() {
                away = view.centroid.to_fixed() - here;
            }
            let step = (here + away.with_length(root(me.speed))).round_to_grid();
            if step != me.position && self.reachable(me.position, step)? == step {
                return self.move_order(me, step);
            }
        }
        self.default_attack(view, me, cluster)
    }

    fn caster_move(&mut self, view: &SquadView, me: &UnitRecord, dest: GridPos) -> Result<Order> {
        let rules = &self.config.rules;
        let mut goal = None;
        if me.mp >= rules.blink_mp && me.ability_ready(Ability::Blink) {
            if view.members.len() == 1 {
                goal = Some(dest);
            } else {
                let behind = me.position.to_fixed() - view.centroid.to_fixed();
                let heading = dest.to_fixed() - view.centroid.to_fixed();
                let lagging = me.position.dist2(view.centroid) > 2 * i64::from(rules.blink_range)
                    && behind.cosine(heading).is_some_and(|c| c < cos_behind());
                if lagging {
                    goal = Some(view.centroid);
                }
            }
        }
        if let Some(goal) = goal {
            let here = me.position.to_fixed();
            let offset = goal.to_fixed() - here;
            let reach = root(rules.blink_range);
            let landing = if offset.length() <= reach {
                goal
            } else {
                (here + offset.with_length(reach)).round_to_grid()
            };
            if landing != me.position {
                return Ok(Order::Cast {
                    ability: Ability::Blink,
                    target: AbilityTarget::Point(landing),
                });
            }
        }
        self.default_move(view, me, dest)
    }

    fn berserker_attack(&mut self, view: &SquadView, me: &UnitRecord, cluster: ClusterId) -> Result<Order> {
        let snap = self.snap;
        let rules = &self.config.rules;
        let primed = me.hp - 1 > me.attack
            && me.mp >= rules.sacrifice_mp
            && me.ability_ready(Ability::Sacrifice)
            && me.attack_cooldown() <= 1;
        if primed && self.scorer.threatened_by(snap, me.id) == 0 {
            let worth = self.clusters.get(cluster).is_some_and(|g| {
                g.records(snap).any(|e| {
                    me.position.within(e.position, i64::from(me.range))
                        && !matches!(e.kind, UnitKind::Ward | UnitKind::Site)
                        && !(g.has_hero && e.kind == UnitKind::Monster)
                })
            });
            if worth {
                return Ok(Order::Cast {
                    ability: Ability::Sacrifice,
                    target: AbilityTarget::None,
                });
            }
        }
        self.default_attack(view, me, cluster)
    }

    /// A cell to drop a ward on near a visible site, if the scout should.
    ///
    /// `dest` is the move destination when moving, `None` when attacking.
    fn ward_spot(&mut self, me: &UnitRecord, dest: Option<GridPos>) -> Option<GridPos> {
        let snap = self.snap;
        let rules = &self.config.rules;
        if me.mp < rules.ward_mp || !me.ability_ready(Ability::PlaceWard) {
            return None;
        }
        let mining = i64::from(rules.mining_range);
        let scan = {
            let r = root(rules.ward_range) + root(rules.mining_range);
            (r * r).to_num::<i64>()
        };
        let site = snap
            .hostiles_within(me.position, scan)
            .find(|u| u.kind == UnitKind::Site)?;
        let contest_r = if dest.is_some() { mining * 2 } else { mining };
        let contested = snap
            .hostiles_within(site.position, contest_r)
            .any(|u| !matches!(u.kind, UnitKind::Site | UnitKind::Ward | UnitKind::Monster));
        let worth_watching = dest.is_some_and(|d| {
            self.mines.energy(site.position) == 0 && site.position.dist2(d) > mining * 4
        });
        if !contested && !worth_watching {
            return None;
        }
        let height = snap.heights.at(me.position);
        for _ in 0..WARD_SAMPLES {
            let p = random_point_in_disc(self.rng, site.position, mining);
            if p.within(me.position, i64::from(rules.ward_range))
                && (snap.heights.at(p) - height).abs() <= 1
            {
                return Some(p);
            }
        }
        None
    }
}

const fn place_ward(spot: GridPos) -> Order {
    Order::Cast {
        ability: Ability::PlaceWard,
        target: AbilityTarget::Point(spot),
    }
}
