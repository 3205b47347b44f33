//! Own-side squads.
//!
//! Squads persist across rounds. Membership changes go through
//! [`SquadRegistry`] so a squad's member list and each member's back-reference
//! in the [`UnitRegistry`] always agree, and so a squad's claim is mirrored in
//! the [`ClaimTable`].

use serde::{Deserialize, Serialize};

use crate::claims::ClaimTable;
use crate::clustering::weighted_centroid;
use crate::math::GridPos;
use crate::snapshot::{EntityId, Snapshot, UnitKind};
use crate::units::UnitRegistry;

/// Stable squad identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SquadId(pub u32);

/// Cache key for squad-level scores: id plus membership revision.
pub type SquadKey = (SquadId, u32);

/// A group of own units acting together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Squad {
    id: SquadId,
    members: Vec<EntityId>,
    created_round: u32,
    claim: Option<GridPos>,
    scout_target: Option<GridPos>,
    sieging: bool,
    revision: u32,
}

impl Squad {
    fn new(id: SquadId, round: u32) -> Self {
        Self {
            id,
            members: Vec::new(),
            created_round: round,
            claim: None,
            scout_target: None,
            sieging: false,
            revision: 0,
        }
    }

    /// Squad id.
    #[must_use]
    pub const fn id(&self) -> SquadId {
        self.id
    }

    /// Members in join order.
    #[must_use]
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    /// Round the squad was formed.
    #[must_use]
    pub const fn created_round(&self) -> u32 {
        self.created_round
    }

    /// Claimed mining site.
    #[must_use]
    pub const fn claim(&self) -> Option<GridPos> {
        self.claim
    }

    /// Current scouting destination.
    #[must_use]
    pub const fn scout_target(&self) -> Option<GridPos> {
        self.scout_target
    }

    /// Whether the squad is assaulting the enemy base.
    #[must_use]
    pub const fn is_sieging(&self) -> bool {
        self.sieging
    }

    /// Cache key that changes whenever membership does.
    #[must_use]
    pub const fn key(&self) -> SquadKey {
        (self.id, self.revision)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the squad has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Weighted centroid of the members present in the snapshot.
    #[must_use]
    pub fn centroid(&self, snap: &Snapshot) -> Option<GridPos> {
        weighted_centroid(snap, &self.members)
    }

    pub(crate) fn set_sieging(&mut self, sieging: bool) {
        self.sieging = sieging;
    }

    pub(crate) fn set_scout_target(&mut self, target: Option<GridPos>) {
        self.scout_target = target;
    }
}

/// Ordered arena of squads.
#[derive(Debug, Clone, Default)]
pub struct SquadRegistry {
    squads: Vec<Squad>,
    next_id: u32,
}

impl SquadRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> SquadId {
        let id = SquadId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a new empty squad formed in `round`.
    pub fn spawn(&mut self, round: u32) -> SquadId {
        let id = self.allocate_id();
        self.squads.push(Squad::new(id, round));
        id
    }

    /// Squad by id.
    #[must_use]
    pub fn get(&self, id: SquadId) -> Option<&Squad> {
        self.squads.iter().find(|s| s.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: SquadId) -> Option<&mut Squad> {
        self.squads.iter_mut().find(|s| s.id == id)
    }

    /// Squad at a registry position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&Squad> {
        self.squads.get(index)
    }

    /// Iterate squads in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Squad> {
        self.squads.iter()
    }

    /// Ids in registry order.
    #[must_use]
    pub fn ids(&self) -> Vec<SquadId> {
        self.squads.iter().map(|s| s.id).collect()
    }

    /// Number of squads, empty ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.squads.len()
    }

    /// Whether there are no squads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }

    /// Add a unit to a squad, removing it from any previous one first.
    pub fn add_member(&mut self, units: &mut UnitRegistry, squad: SquadId, unit: EntityId) {
        if let Some(previous) = units.squad_of(unit) {
            if previous == squad {
                return;
            }
            self.remove_member(units, previous, unit);
        }
        if let Some(s) = self.get_mut(squad) {
            s.members.push(unit);
            s.revision += 1;
            units.set_squad(unit, Some(squad));
        }
    }

    /// Remove a unit from a squad.
    pub fn remove_member(&mut self, units: &mut UnitRegistry, squad: SquadId, unit: EntityId) {
        if let Some(s) = self.get_mut(squad) {
            let before = s.members.len();
            s.members.retain(|&m| m != unit);
            if s.members.len() != before {
                s.revision += 1;
                if units.squad_of(unit) == Some(squad) {
                    units.set_squad(unit, None);
                }
            }
        }
    }

    /// Claim a site for a squad, releasing whatever it held before.
    pub fn set_claim(&mut self, claims: &mut ClaimTable, squad: SquadId, pos: GridPos) -> bool {
        let Some(s) = self.get_mut(squad) else {
            return false;
        };
        if s.claim == Some(pos) {
            return claims.claim(pos, squad);
        }
        if !claims.claim(pos, squad) {
            return false;
        }
        if let Some(old) = s.claim.replace(pos) {
            claims.release(old, squad);
        }
        true
    }

    /// Release a squad's claim, if any.
    pub fn release_claim(&mut self, claims: &mut ClaimTable, squad: SquadId) {
        if let Some(s) = self.get_mut(squad) {
            if let Some(pos) = s.claim.take() {
                claims.release(pos, squad);
            }
        }
    }

    /// Move every member of `from` into `to`.
    ///
    /// `from`'s claim goes to `to` when `to` holds none; otherwise it is
    /// released. `from` ends empty.
    pub fn merge_into(
        &mut self,
        units: &mut UnitRegistry,
        claims: &mut ClaimTable,
        from: SquadId,
        to: SquadId,
    ) {
        if from == to {
            return;
        }
        let Some(source) = self.get_mut(from) else {
            return;
        };
        let moving = std::mem::take(&mut source.members);
        source.revision += 1;
        let source_claim = source.claim.take();
        source.sieging = false;

        let Some(target) = self.get_mut(to) else {
            // Target vanished: put the members back where they were.
            if let Some(source) = self.get_mut(from) {
                source.members = moving;
                source.claim = source_claim;
            }
            return;
        };
        for &unit in &moving {
            target.members.push(unit);
            units.set_squad(unit, Some(to));
        }
        target.revision += 1;

        if let Some(pos) = source_claim {
            if target.claim.is_none() && claims.transfer(pos, from, to) {
                target.claim = Some(pos);
            } else {
                claims.release(pos, from);
            }
        }
        tracing::debug!(from = ?from, to = ?to, moved = moving.len(), "Merged squads");
    }

    /// Turn a squad into a fresh one in place: new id, formed in `round`,
    /// claim released, no scouting or siege.
    pub fn reset(
        &mut self,
        units: &mut UnitRegistry,
        claims: &mut ClaimTable,
        squad: SquadId,
        round: u32,
    ) -> Option<SquadId> {
        self.release_claim(claims, squad);
        let fresh = self.allocate_id();
        let s = self.get_mut(squad)?;
        s.id = fresh;
        s.created_round = round;
        s.scout_target = None;
        s.sieging = false;
        s.revision = 0;
        for &unit in &s.members {
            units.set_squad(unit, Some(fresh));
        }
        tracing::debug!(old = ?squad, new = ?fresh, "Reset squad in place");
        Some(fresh)
    }

    /// Give every alive own unit (not base, not ward) without a squad a new
    /// singleton squad, and drop members no longer in the snapshot.
    pub fn enlist(&mut self, units: &mut UnitRegistry, snap: &Snapshot) {
        for squad in &mut self.squads {
            let before = squad.members.len();
            squad.members.retain(|&m| {
                let present = snap.unit(m).is_some();
                if !present {
                    tracing::warn!(unit = m, squad = ?squad.id, "Unit gone from snapshot");
                    units.set_squad(m, None);
                }
                present
            });
            if squad.members.len() != before {
                squad.revision += 1;
            }
        }

        let recruits: Vec<EntityId> = snap
            .own_units()
            .filter(|u| u.is_alive() && !matches!(u.kind, UnitKind::Base | UnitKind::Ward))
            .map(|u| u.id)
            .collect();
        for id in recruits {
            if let Some(record) = snap.unit(id) {
                units.track(record);
            }
            if units.squad_of(id).is_none() {
                let squad = self.spawn(snap.round);
                self.add_member(units, squad, id);
                tracing::debug!(unit = id, squad = ?squad, "Enlisted unit into new squad");
            }
        }
    }

    /// Remove squads with no members, releasing their claims.
    pub fn purge_empty(&mut self, claims: &mut ClaimTable) -> usize {
        let before = self.squads.len();
        self.squads.retain(|s| {
            if s.members.is_empty() {
                claims.release_all(s.id);
                tracing::debug!(squad = ?s.id, "Purged empty squad");
                false
            } else {
                true
            }
        });
        before - self.squads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Economy, HeightMap, Side, UnitRecord};

    fn own(id: EntityId, kind: UnitKind, x: i32, y: i32) -> UnitRecord {
        UnitRecord {
            id,
            side: Some(Side::First),
            kind,
            position: GridPos::new(x, y),
            hp: 10,
            max_hp: 10,
            ..UnitRecord::default()
        }
    }

    fn snapshot(round: u32, units: Vec<UnitRecord>) -> Snapshot {
        Snapshot::new(round, Side::First, units, HeightMap::flat(150, 150), Economy::default())
    }

    #[test]
    fn test_enlist_skips_base_ward_and_dead() {
        let mut dead = own(4, UnitKind::Tank, 0, 0);
        dead.hp = 0;
        let snap = snapshot(
            1,
            vec![
                own(1, UnitKind::Tank, 0, 0),
                own(2, UnitKind::Base, 10, 10),
                own(3, UnitKind::Ward, 5, 5),
                dead,
            ],
        );
        let mut squads = SquadRegistry::new();
        let mut units = UnitRegistry::new();
        squads.enlist(&mut units, &snap);

        assert_eq!(squads.len(), 1);
        let squad = squads.at(0).unwrap();
        assert_eq!(squad.members(), &[1]);
        assert_eq!(squad.created_round(), 1);
        assert_eq!(units.squad_of(1), Some(squad.id()));
    }

    #[test]
    fn test_add_member_moves_between_squads() {
        let snap = snapshot(1, vec![own(1, UnitKind::Tank, 0, 0)]);
        let mut squads = SquadRegistry::new();
        let mut units = UnitRegistry::new();
        units.track(snap.unit(1).unwrap());
        let a = squads.spawn(1);
        let b = squads.spawn(1);
        squads.add_member(&mut units, a, 1);
        squads.add_member(&mut units, b, 1);

        assert!(squads.get(a).unwrap().is_empty());
        assert_eq!(squads.get(b).unwrap().members(), &[1]);
        assert_eq!(units.squad_of(1), Some(b));
    }

    #[test]
    fn test_merge_transfers_claim() {
        let snap = snapshot(1, vec![own(1, UnitKind::Tank, 0, 0), own(2, UnitKind::Tank, 1, 0)]);
        let mut squads = SquadRegistry::new();
        let mut units = UnitRegistry::new();
        let mut claims = ClaimTable::new();
        squads.enlist(&mut units, &snap);
        let a = squads.at(0).unwrap().id();
        let b = squads.at(1).unwrap().id();
        let site = GridPos::new(75, 75);
        assert!(squads.set_claim(&mut claims, a, site));

        squads.merge_into(&mut units, &mut claims, a, b);

        assert!(squads.get(a).unwrap().is_empty());
        assert_eq!(squads.get(a).unwrap().claim(), None);
        assert_eq!(squads.get(b).unwrap().claim(), Some(site));
        assert_eq!(claims.holder(site), Some(b));
        assert_eq!(units.squad_of(1), Some(b));
    }

    #[test]
    fn test_merge_releases_claim_when_target_holds_one() {
        let snap = snapshot(1, vec![own(1, UnitKind::Tank, 0, 0), own(2, UnitKind::Tank, 1, 0)]);
        let mut squads = SquadRegistry::new();
        let mut units = UnitRegistry::new();
        let mut claims = ClaimTable::new();
        squads.enlist(&mut units, &snap);
        let a = squads.at(0).unwrap().id();
        let b = squads.at(1).unwrap().id();
        squads.set_claim(&mut claims, a, GridPos::new(1, 1));
        squads.set_claim(&mut claims, b, GridPos::new(2, 2));

        squads.merge_into(&mut units, &mut claims, a, b);

        assert_eq!(claims.len(), 1);
        assert_eq!(claims.holder(GridPos::new(2, 2)), Some(b));
    }

    #[test]
    fn test_reset_gives_fresh_identity() {
        let snap = snapshot(1, vec![own(1, UnitKind::Tank, 0, 0)]);
        let mut squads = SquadRegistry::new();
        let mut units = UnitRegistry::new();
        let mut claims = ClaimTable::new();
        squads.enlist(&mut units, &snap);
        let old = squads.at(0).unwrap().id();
        squads.set_claim(&mut claims, old, GridPos::new(5, 5));

        let fresh = squads.reset(&mut units, &mut claims, old, 9).unwrap();

        assert_ne!(old, fresh);
        let squad = squads.get(fresh).unwrap();
        assert_eq!(squad.created_round(), 9);
        assert_eq!(squad.claim(), None);
        assert!(claims.is_empty());
        assert_eq!(units.squad_of(1), Some(fresh));
    }

    #[test]
    fn test_purge_releases_claims() {
        let mut squads = SquadRegistry::new();
        let mut claims = ClaimTable::new();
        let a = squads.spawn(1);
        squads.set_claim(&mut claims, a, GridPos::new(3, 3));
        assert_eq!(squads.purge_empty(&mut claims), 1);
        assert!(squads.is_empty());
        assert!(claims.is_empty());
    }

    #[test]
    fn test_enlist_drops_missing_members() {
        let first = snapshot(1, vec![own(1, UnitKind::Tank, 0, 0)]);
        let mut squads = SquadRegistry::new();
        let mut units = UnitRegistry::new();
        squads.enlist(&mut units, &first);

        let second = snapshot(2, vec![]);
        squads.enlist(&mut units, &second);
        assert!(squads.at(0).unwrap().is_empty());
        assert!(units.squad_of(1).is_none());
    }

    #[test]
    fn test_revision_changes_key() {
        let snap = snapshot(1, vec![own(1, UnitKind::Tank, 0, 0), own(2, UnitKind::Tank, 1, 0)]);
        let mut squads = SquadRegistry::new();
        let mut units = UnitRegistry::new();
        let mut claims = ClaimTable::new();
        squads.enlist(&mut units, &snap);
        let a = squads.at(0).unwrap().id();
        let before = squads.get(a).unwrap().key();
        let b = squads.at(1).unwrap().id();
        squads.merge_into(&mut units, &mut claims, b, a);
        assert_ne!(squads.get(a).unwrap().key(), before);
    }
}
