//! Squad behaviors, tried in a fixed priority order each round.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clustering::ClusterId;
use crate::dispatch::{random_point_in_disc, RouteMode, SquadView, Tactician};
use crate::error::Result;
use crate::math::{cos_behind, nan_to_zero, saturate, GridPos};
use crate::snapshot::{Ability, UnitKind};
use crate::squads::SquadId;

/// What a squad did this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    /// Fall back to the home base.
    Retreat,
    /// Push on the enemy base.
    BaseAssault,
    /// Clear intruders near home.
    BaseDefense,
    /// Send a lone scout to watch a site.
    Scout,
    /// Claim and hold a mining site.
    Contest,
    /// Help a squad that is outnumbered.
    Reinforce,
    /// Wander near home looking for trouble.
    Search,
}

impl Behavior {
    /// Order in which behaviors are tried; the first that applies runs.
    pub const PRIORITY: [Self; 7] = [
        Self::Retreat,
        Self::BaseAssault,
        Self::BaseDefense,
        Self::Scout,
        Self::Contest,
        Self::Reinforce,
        Self::Search,
    ];
}

/// Attempts at drawing a search point before giving up.
const SEARCH_ATTEMPTS: usize = 64;

impl Tactician<'_> {
    /// Run the first applicable behavior for a squad.
    pub(crate) fn run_squad(&mut self, id: SquadId) -> Result<Option<Behavior>> {
        let Some(view) = self.squad_view(id) else {
            return Ok(None);
        };
        for behavior in Behavior::PRIORITY {
            let applied = match behavior {
                Behavior::Retreat => self.retreat(&view)?,
                Behavior::BaseAssault => self.base_assault(&view)?,
                Behavior::BaseDefense => self.base_defense(&view)?,
                Behavior::Scout => self.scout(&view)?,
                Behavior::Contest => self.contest(&view)?,
                Behavior::Reinforce => self.reinforce(&view)?,
                Behavior::Search => self.search(&view)?,
            };
            if !applied {
                continue;
            }
            match behavior {
                Behavior::Retreat | Behavior::BaseAssault | Behavior::BaseDefense => {
                    self.squads.release_claim(self.claims, id);
                    if let Some(squad) = self.squads.get_mut(id) {
                        squad.set_scout_target(None);
                    }
                }
                Behavior::Scout => self.squads.release_claim(self.claims, id),
                _ => {}
            }
            tracing::debug!(round = self.round(), squad = ?id, ?behavior, "Squad behavior chosen");
            return Ok(Some(behavior));
        }
        Ok(None)
    }

    fn move_all(&mut self, view: &SquadView, dest: GridPos) -> Result<()> {
        for &m in &view.members {
            self.command_move(view, m, dest)?;
        }
        Ok(())
    }

    fn attack_all(&mut self, view: &SquadView, cluster: ClusterId) -> Result<()> {
        for &m in &view.members {
            self.command_attack(view, m, cluster)?;
        }
        Ok(())
    }

    fn retreat(&mut self, view: &SquadView) -> Result<bool> {
        let snap = self.snap;
        let thresholds = &self.config.thresholds;
        let Some(squad) = self.squads.get(view.id) else {
            return Ok(false);
        };
        let health = self.scorer.squad_health(snap, squad);
        let surround = self.scorer.surround(snap, self.clusters, squad);
        if health >= thresholds.retreat_health && surround >= thresholds.retreat_surround {
            return Ok(false);
        }
        let home = self.home();
        self.with_route(RouteMode::HazardAware, |t| t.move_all(view, home))?;
        Ok(true)
    }

    fn base_assault(&mut self, view: &SquadView) -> Result<bool> {
        let snap = self.snap;
        let thresholds = &self.config.thresholds;
        let Some(squad) = self.squads.get(view.id) else {
            return Ok(false);
        };
        let size = squad.len();
        let sieging = squad.is_sieging();
        let enemy_base = self.enemy_base();
        let go = if self.alarmed {
            let needed = if sieging {
                thresholds.alarm_assault_current
            } else {
                thresholds.alarm_assault_new
            };
            // Strictly nearer the enemy base; equidistant squads stay home.
            view.centroid.dist2(enemy_base) < view.centroid.dist2(self.home()) && size >= needed
        } else {
            let needed = if sieging {
                thresholds.assault_current
            } else {
                thresholds.assault_new
            };
            size >= needed
        };
        if let Some(squad) = self.squads.get_mut(view.id) {
            squad.set_sieging(go);
        }
        if !go {
            return Ok(false);
        }

        let mut target: Option<(ClusterId, f64)> = None;
        for &m in &view.members {
            let Some(me) = snap.unit(m) else {
                continue;
            };
            let seen: Vec<ClusterId> = snap
                .hostiles_within(me.position, i64::from(me.vision))
                .filter(|u| {
                    !matches!(u.kind, UnitKind::Site | UnitKind::Ward | UnitKind::Monster)
                        && !u.is_reviving()
                })
                .filter_map(|u| self.clusters.cluster_of(u.id))
                .collect();
            for cid in seen {
                let Some(cluster) = self.clusters.get(cid) else {
                    continue;
                };
                let v = self.scorer.cluster_value(snap, cluster);
                if target.map_or(true, |(_, best)| v > best) {
                    target = Some((cid, v));
                }
            }
        }
        match target {
            Some((cid, _)) => self.attack_all(view, cid)?,
            None => self.move_all(view, enemy_base)?,
        }
        Ok(true)
    }

    fn base_defense(&mut self, view: &SquadView) -> Result<bool> {
        if !self.alarmed {
            return Ok(false);
        }
        let home = self.home();
        let intruder = self
            .snap
            .hostiles_within(home, i64::from(self.config.rules.base_range))
            .filter(|u| u.is_active())
            .find_map(|u| self.clusters.cluster_of(u.id));
        match intruder {
            Some(cid) => self.attack_all(view, cid)?,
            None => self.move_all(view, home)?,
        }
        Ok(true)
    }

    fn scout(&mut self, view: &SquadView) -> Result<bool> {
        let snap = self.snap;
        let config = self.config;
        let rules = &config.rules;
        let &[member] = view.members.as_slice() else {
            return Ok(false);
        };
        let ready = snap.unit(member).is_some_and(|me| {
            me.kind == UnitKind::Scout && me.mp >= rules.ward_mp && me.ability_ready(Ability::PlaceWard)
        });
        if !ready {
            if let Some(squad) = self.squads.get_mut(view.id) {
                squad.set_scout_target(None);
            }
            return Ok(false);
        }

        let watch = i64::from(rules.mining_range) * 4;
        let previous = self.squads.get(view.id).and_then(|s| s.scout_target());
        let mut target = previous.filter(|&t| {
            let busy = snap
                .hostiles_within(t, watch)
                .any(|u| !matches!(u.kind, UnitKind::Site | UnitKind::Ward | UnitKind::Monster))
                && t.dist2(view.centroid) < config.thresholds.scout_arrive_dist2;
            let lair = snap
                .hostiles_within(t, watch)
                .any(|u| u.kind == UnitKind::Monster)
                && t.dist2(view.centroid) < i64::from(rules.scout_vision);
            !busy && !lair
        });

        if target.is_none() {
            let sites = config.layout.scoutable_sites();
            let mut candidates: Vec<GridPos> = sites
                .iter()
                .copied()
                .filter(|&p| Some(p) != previous && snap.own_within(p, watch).next().is_none())
                .collect();
            if candidates.is_empty() {
                candidates = sites
                    .iter()
                    .copied()
                    .filter(|&p| {
                        Some(p) != previous
                            && self.mines.energy(p) <= 0
                            && self
                                .clusters
                                .site_cluster_near(snap, p, rules.mining_range)
                                .is_none()
                    })
                    .collect();
            }
            if candidates.is_empty() {
                if let Some(squad) = self.squads.get_mut(view.id) {
                    squad.set_scout_target(None);
                }
                return Ok(false);
            }
            target = Some(candidates[self.rng.gen_range(0..candidates.len())]);
        }

        let Some(target) = target else {
            return Ok(false);
        };
        if let Some(squad) = self.squads.get_mut(view.id) {
            squad.set_scout_target(Some(target));
        }
        self.command_move(view, member, target)?;
        Ok(true)
    }

    /// Worth of contesting a visible site cluster from `from`.
    fn contest_factor(&mut self, cluster: ClusterId, from: GridPos) -> f64 {
        let snap = self.snap;
        let Some(group) = self.clusters.get(cluster) else {
            return 0.0;
        };
        let Some(center) = group.centroid(snap) else {
            return 0.0;
        };
        let reward = self.scorer.mine_factor(snap, group);
        let danger = self.scorer.cluster_danger(snap, group);
        let x = nan_to_zero(reward / danger);
        let discount =
            saturate(from.dist2(center) as f64 * self.config.thresholds.contest_distance_factor);
        nan_to_zero(saturate(x / discount))
    }

    /// Nearest unclaimed, unseen site with acceptable energy and few
    /// remembered enemies for a squad of `size`.
    fn nearest_unseen_site(&self, from: GridPos, size: usize, energy_ok: impl Fn(i32) -> bool) -> Option<GridPos> {
        let snap = self.snap;
        let mining = self.config.rules.mining_range;
        let crowd = i64::from(mining) * 16;
        let allowed = size as f64 * self.config.thresholds.enemies_per_member;
        let mut next: Option<GridPos> = None;
        for &p in &self.config.layout.sites {
            if self.claims.is_claimed(p)
                || !energy_ok(self.mines.energy(p))
                || self.clusters.site_cluster_near(snap, p, mining).is_some()
                || next.is_some_and(|n| from.dist2(p) >= from.dist2(n))
            {
                continue;
            }
            if self.memory.count_near(p, crowd, snap.round) as f64 <= allowed {
                next = Some(p);
            }
        }
        next
    }

    fn contest(&mut self, view: &SquadView) -> Result<bool> {
        let snap = self.snap;
        let config = self.config;
        let thresholds = &config.thresholds;
        let mining = config.rules.mining_range;
        let Some(size) = self.squads.get(view.id).map(|s| s.len()) else {
            return Ok(false);
        };
        if size < thresholds.contest_current {
            self.squads.release_claim(self.claims, view.id);
            return Ok(false);
        }
        let c = view.centroid;

        let held = self.squads.get(view.id).and_then(|s| s.claim());
        if let (Some(site), None) = (held, view.engaged) {
            if let Some(cid) = self.clusters.site_cluster_near(snap, site, mining) {
                let keep = thresholds.claim_threshold * thresholds.claim_release_ratio;
                if self.contest_factor(cid, c) <= keep {
                    tracing::debug!(round = snap.round, squad = ?view.id, ?site, "Releasing site not worth holding");
                    self.squads.release_claim(self.claims, view.id);
                }
            }
        }
        let held = self.squads.get(view.id).and_then(|s| s.claim());

        let mut next: Option<GridPos> = None;
        if size >= thresholds.contest_new {
            let mut best = 0.0;
            let visible: Vec<(ClusterId, GridPos)> = self
                .clusters
                .iter()
                .filter_map(|g| g.site(snap).map(|s| (g.id, s.position)))
                .collect();
            for (cid, site) in visible {
                if self.claims.is_claimed(site) {
                    continue;
                }
                let f = self.contest_factor(cid, c);
                if f > thresholds.claim_threshold && f > best {
                    best = f;
                    next = Some(site);
                }
            }
            if next.is_none() {
                next = self.nearest_unseen_site(c, size, |e| e >= thresholds.site_energy_threshold);
            }
            if next.is_none() && held.is_none() {
                next = self.nearest_unseen_site(c, size, |e| e > 0);
            }
            if let (Some(n), Some(central)) = (next, config.layout.central_site()) {
                if n != central && !self.claims.is_claimed_by_other(central, view.id) {
                    let v1 = c.to_fixed() - central.to_fixed();
                    let v2 = n.to_fixed() - central.to_fixed();
                    let opposite = c.dist2(central) > i64::from(mining) * 4
                        && v1.cosine(v2).is_some_and(|cos| cos < cos_behind());
                    if opposite {
                        next = Some(central);
                    }
                }
            }
        }

        let switch = match (held, next) {
            (None, Some(_)) => true,
            (Some(cur), Some(n)) => view.engaged.is_none() && c.dist2(n) < c.dist2(cur),
            _ => false,
        };
        if let (true, Some(n)) = (switch, next) {
            if self.squads.set_claim(self.claims, view.id, n) {
                tracing::debug!(round = snap.round, squad = ?view.id, site = ?n, "Site claimed");
            }
        }

        let Some(site) = self.squads.get(view.id).and_then(|s| s.claim()) else {
            return Ok(false);
        };
        match self.clusters.site_cluster_near(snap, site, mining) {
            Some(cid) => {
                for &m in &view.members {
                    self.command_contest(view, m, cid)?;
                }
            }
            None => self.move_all(view, site)?,
        }
        Ok(true)
    }

    fn reinforce(&mut self, view: &SquadView) -> Result<bool> {
        let snap = self.snap;
        let thresholds = &self.config.thresholds;
        let Some(squad) = self.squads.get(view.id) else {
            return Ok(false);
        };
        if self.scorer.squad_health(snap, squad) < thresholds.retreat_health {
            return Ok(false);
        }
        let here = self.scorer.map_danger(snap, view.centroid);

        let mut target: Option<(SquadId, GridPos, f64)> = None;
        for other in self.squads.iter() {
            if other.id() == view.id || other.is_empty() {
                continue;
            }
            let Some(c) = other.centroid(snap) else {
                continue;
            };
            if self.scorer.map_danger(snap, c) <= here {
                continue;
            }
            let s = self.scorer.surround(snap, self.clusters, other);
            if s < thresholds.reinforce_surround && target.map_or(true, |(_, _, best)| s < best) {
                target = Some((other.id(), c, s));
            }
        }
        let Some((other, centroid, _)) = target else {
            return Ok(false);
        };

        let engaged = self
            .squads
            .get(other)
            .and_then(|o| self.scorer.engaged_cluster(snap, self.clusters, self.memory, o));
        match engaged {
            Some(cid) if view.centroid.dist2(centroid) < thresholds.reinforce_engage_dist2 => {
                self.attack_all(view, cid)?;
            }
            _ => self.with_route(RouteMode::HazardAware, |t| t.move_all(view, centroid))?,
        }
        Ok(true)
    }

    fn search(&mut self, view: &SquadView) -> Result<bool> {
        let home = self.home();
        let outer = self.config.thresholds.search_radius2;
        let inner = i64::from(self.config.rules.base_view) * 6 / 5;
        let size = self.config.layout.map_size;
        for &m in &view.members {
            let mut dest = home;
            for _ in 0..SEARCH_ATTEMPTS {
                let p = random_point_in_disc(self.rng, home, outer);
                if !p.within(home, inner) && p.x > 0 && p.y > 0 && p.x < size && p.y < size {
                    dest = p;
                    break;
                }
            }
            self.command_move(view, m, dest)?;
        }
        Ok(true)
    }
}
