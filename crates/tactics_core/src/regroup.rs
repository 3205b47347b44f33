//! Merging nearby squads and splitting off members that no longer fit.

use crate::dispatch::Tactician;
use crate::scoring::Scorer;
use crate::snapshot::{Ability, EntityId, Effect, UnitKind};
use crate::squads::SquadId;

impl Tactician<'_> {
    /// Try to join each squad into another, else split it.
    ///
    /// Walks the registry by index so squads spawned by a split are visited
    /// too.
    pub(crate) fn regroup(&mut self) {
        let mut index = 0;
        while let Some(squad) = self.squads.at(index) {
            let id = squad.id();
            if !squad.is_empty() && !self.try_join(id) {
                self.try_split(id);
            }
            index += 1;
        }
    }

    /// Merge `id` into the first compatible squad. Returns whether it merged.
    fn try_join(&mut self, id: SquadId) -> bool {
        let snap = self.snap;
        let round = snap.round;
        let thresholds = &self.config.thresholds;
        let Some(source) = self.squads.get(id) else {
            return false;
        };
        if source.created_round() == round || source.scout_target().is_some() {
            return false;
        }
        let Some(from) = source.centroid(snap) else {
            return false;
        };
        if self.scorer.squad_health(snap, source) < thresholds.retreat_health {
            return false;
        }
        let claim = source.claim();
        let sieging = source.is_sieging();
        let here = self.scorer.map_danger(snap, from);

        let mut target = None;
        for other in self.squads.iter() {
            if other.id() == id
                || other.is_empty()
                || other.created_round() == round
                || other.scout_target().is_some()
                || (sieging && !other.is_sieging())
                || (claim.is_some() && claim != other.claim())
            {
                continue;
            }
            let Some(to) = other.centroid(snap) else {
                continue;
            };
            if from.dist2(to) > thresholds.join_dist2
                || self.scorer.squad_health(snap, other) < thresholds.retreat_health
            {
                continue;
            }
            let same_state = claim == other.claim() && sieging == other.is_sieging();
            if !same_state && self.scorer.map_danger(snap, to) > here {
                continue;
            }
            target = Some(other.id());
            break;
        }

        let Some(target) = target else {
            return false;
        };
        self.squads.merge_into(self.units, self.claims, id, target);
        true
    }

    /// Move members that should leave into a new squad. Returns whether a
    /// new squad was spawned.
    fn try_split(&mut self, id: SquadId) -> bool {
        let snap = self.snap;
        let round = snap.round;
        let thresholds = &self.config.thresholds;
        let rules = &self.config.rules;
        let Some(squad) = self.squads.get(id) else {
            return false;
        };
        if squad.len() < 2 || self.scorer.squad_health(snap, squad) < thresholds.retreat_health {
            return false;
        }
        let idle = squad.claim().is_none()
            && !squad.is_sieging()
            && self
                .scorer
                .engaged_cluster(snap, self.clusters, self.memory, squad)
                .is_none();

        let (leaving, staying): (Vec<EntityId>, Vec<EntityId>) =
            squad.members().iter().partition(|&&m| {
                snap.unit(m).is_some_and(|u| {
                    let weak = Scorer::unit_health(u) < thresholds.retreat_health
                        && !u.has(Effect::Undying)
                        && !u.has(Effect::Stunned);
                    let spare_scout = idle
                        && u.kind == UnitKind::Scout
                        && u.mp >= rules.ward_mp
                        && u.ability_ready(Ability::PlaceWard);
                    weak || u.is_reviving() || spare_scout
                })
            });
        if leaving.is_empty() {
            return false;
        }
        if staying.is_empty() {
            self.squads.reset(self.units, self.claims, id, round);
            return false;
        }
        let fresh = self.squads.spawn(round);
        for &m in &leaving {
            self.squads.add_member(self.units, fresh, m);
        }
        tracing::debug!(round, from = ?id, into = ?fresh, moved = leaving.len(), "Squad split");
        true
    }
}
