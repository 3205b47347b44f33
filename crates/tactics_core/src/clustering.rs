//! Threat clustering.
//!
//! Hostile units are grouped by proximity flood fill every round. Two units
//! are adjacent when their squared distance is at most the configured radius
//! (boundary inclusive); a cluster is a connected component of that relation.
//! Dead and reviving units are left out. Mining sites are absorbed by the
//! combatants near them but never start a component of their own; a site no
//! combatant reached ends up alone in a trailing pass, so every relevant
//! hostile belongs to exactly one cluster.

use std::collections::{HashMap, VecDeque};

use crate::math::{Fixed, GridPos};
use crate::snapshot::{EntityId, Snapshot, UnitKind, UnitRecord};

/// Index of a cluster within one round's [`ClusterSet`].
pub type ClusterId = usize;

/// A connected group of hostile units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatCluster {
    /// Position in the round's cluster list.
    pub id: ClusterId,
    /// Members in discovery order.
    pub members: Vec<EntityId>,
    /// Whether any member is a hero.
    pub has_hero: bool,
}

impl ThreatCluster {
    /// Weighted centroid of the members.
    #[must_use]
    pub fn centroid(&self, snap: &Snapshot) -> Option<GridPos> {
        weighted_centroid(snap, &self.members)
    }

    /// The first mining site among the members.
    #[must_use]
    pub fn site<'s>(&'s self, snap: &'s Snapshot) -> Option<&'s UnitRecord> {
        self.records(snap).find(|u| u.kind == UnitKind::Site)
    }

    /// Whether the cluster is nothing but one mining site.
    #[must_use]
    pub fn is_lone_site(&self, snap: &Snapshot) -> bool {
        self.members.len() == 1 && self.site(snap).is_some()
    }

    /// Member records that are still in the snapshot.
    pub fn records<'s>(&'s self, snap: &'s Snapshot) -> impl Iterator<Item = &'s UnitRecord> {
        self.members.iter().filter_map(move |&id| snap.unit(id))
    }
}

/// All clusters of one round.
#[derive(Debug, Clone, Default)]
pub struct ClusterSet {
    clusters: Vec<ThreatCluster>,
    membership: HashMap<EntityId, ClusterId>,
}

impl ClusterSet {
    /// Cluster by id.
    #[must_use]
    pub fn get(&self, id: ClusterId) -> Option<&ThreatCluster> {
        self.clusters.get(id)
    }

    /// Cluster a hostile unit belongs to.
    #[must_use]
    pub fn cluster_of(&self, unit: EntityId) -> Option<ClusterId> {
        self.membership.get(&unit).copied()
    }

    /// Iterate clusters in formation order.
    pub fn iter(&self) -> impl Iterator<Item = &ThreatCluster> {
        self.clusters.iter()
    }

    /// Number of clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether no hostile is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster of a visible mining site within `mining_range` of `point`.
    #[must_use]
    pub fn site_cluster_near(
        &self,
        snap: &Snapshot,
        point: GridPos,
        mining_range: i32,
    ) -> Option<ClusterId> {
        snap.hostiles_within(point, i64::from(mining_range))
            .filter(|u| u.kind == UnitKind::Site)
            .find_map(|u| self.cluster_of(u.id))
    }
}

/// Whether a hostile takes part in clustering.
fn is_relevant(unit: &UnitRecord) -> bool {
    unit.is_active()
}

/// Build this round's clusters from the snapshot.
#[must_use]
pub fn build_clusters(snap: &Snapshot, radius2: i64) -> ClusterSet {
    let candidates: Vec<&UnitRecord> = snap.hostile_units().filter(|u| is_relevant(u)).collect();
    let mut set = ClusterSet::default();

    // Combatants seed first; leftover sites become singletons afterwards.
    let primary = candidates.iter().filter(|u| u.kind != UnitKind::Site);
    let trailing = candidates.iter().filter(|u| u.kind == UnitKind::Site);

    for seed in primary.chain(trailing) {
        if set.membership.contains_key(&seed.id) {
            continue;
        }
        let id = set.clusters.len();
        let mut cluster = ThreatCluster {
            id,
            members: Vec::new(),
            has_hero: false,
        };
        let mut frontier = VecDeque::from([*seed]);
        set.membership.insert(seed.id, id);

        while let Some(current) = frontier.pop_front() {
            cluster.members.push(current.id);
            cluster.has_hero |= current.kind.is_hero();
            for other in &candidates {
                if set.membership.contains_key(&other.id) {
                    continue;
                }
                if current.position.within(other.position, radius2) {
                    set.membership.insert(other.id, id);
                    frontier.push_back(*other);
                }
            }
        }
        set.clusters.push(cluster);
    }

    tracing::debug!(
        round = snap.round,
        side = ?snap.side,
        clusters = set.clusters.len(),
        units = set.membership.len(),
        "Formed threat clusters"
    );
    set
}

/// Weighted mean position of the given units; casters weigh three.
///
/// Ids missing from the snapshot are skipped. `None` when nothing remains.
#[must_use]
pub fn weighted_centroid(snap: &Snapshot, members: &[EntityId]) -> Option<GridPos> {
    let mut sum_x: i64 = 0;
    let mut sum_y: i64 = 0;
    let mut weight: i64 = 0;
    for unit in members.iter().filter_map(|&id| snap.unit(id)) {
        let w = unit.kind.centroid_weight();
        sum_x += i64::from(unit.position.x) * w;
        sum_y += i64::from(unit.position.y) * w;
        weight += w;
    }
    if weight == 0 {
        return None;
    }
    let w = Fixed::from_num(weight);
    let x = Fixed::from_num(sum_x) / w;
    let y = Fixed::from_num(sum_y) / w;
    Some(GridPos::new(x.round().to_num(), y.round().to_num()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::GridPos;
    use crate::snapshot::{Economy, Effect, HeightMap, Side, StatusEffect};

    fn hostile(id: EntityId, kind: UnitKind, x: i32, y: i32) -> UnitRecord {
        UnitRecord {
            id,
            side: Some(Side::Second),
            kind,
            position: GridPos::new(x, y),
            hp: 100,
            max_hp: 100,
            ..UnitRecord::default()
        }
    }

    fn snapshot(units: Vec<UnitRecord>) -> Snapshot {
        Snapshot::new(1, Side::First, units, HeightMap::flat(150, 150), Economy::default())
    }

    #[test]
    fn test_boundary_is_inclusive() {
        // 5² + 12² = 169
        let snap = snapshot(vec![
            hostile(1, UnitKind::Tank, 0, 0),
            hostile(2, UnitKind::Tank, 5, 12),
        ]);
        let set = build_clusters(&snap, 169);
        assert_eq!(set.len(), 1);
        assert_eq!(set.cluster_of(1), set.cluster_of(2));
    }

    #[test]
    fn test_just_outside_splits() {
        // 13² + 1² = 170
        let snap = snapshot(vec![
            hostile(1, UnitKind::Tank, 0, 0),
            hostile(2, UnitKind::Tank, 13, 1),
        ]);
        let set = build_clusters(&snap, 169);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_chain_is_transitive() {
        let snap = snapshot(vec![
            hostile(1, UnitKind::Tank, 0, 0),
            hostile(2, UnitKind::Scout, 12, 0),
            hostile(3, UnitKind::Other, 24, 0),
        ]);
        let set = build_clusters(&snap, 169);
        assert_eq!(set.len(), 1);
        assert!(set.get(0).unwrap().has_hero);
    }

    #[test]
    fn test_site_absorbed_but_never_seeds() {
        let snap = snapshot(vec![
            hostile(10, UnitKind::Site, 0, 0),
            hostile(1, UnitKind::Tank, 3, 0),
            hostile(11, UnitKind::Site, 100, 100),
        ]);
        let set = build_clusters(&snap, 169);
        assert_eq!(set.len(), 2);
        // The tank seeds first and absorbs the nearby site.
        let first = set.get(0).unwrap();
        assert_eq!(first.members, vec![1, 10]);
        // The remote site is a trailing singleton.
        assert!(set.get(1).unwrap().is_lone_site(&snap));
    }

    #[test]
    fn test_reviving_and_dead_excluded() {
        let mut reviving = hostile(2, UnitKind::Tank, 1, 0);
        reviving.effects.push(StatusEffect {
            effect: Effect::Reviving,
            remaining: 3,
        });
        let mut dead = hostile(3, UnitKind::Tank, 2, 0);
        dead.hp = 0;
        let snap = snapshot(vec![hostile(1, UnitKind::Tank, 0, 0), reviving, dead]);
        let set = build_clusters(&snap, 169);
        assert_eq!(set.len(), 1);
        assert!(set.cluster_of(2).is_none());
        assert!(set.cluster_of(3).is_none());
    }

    #[test]
    fn test_own_units_ignored() {
        let mut own = hostile(2, UnitKind::Tank, 1, 0);
        own.side = Some(Side::First);
        let snap = snapshot(vec![hostile(1, UnitKind::Tank, 0, 0), own]);
        let set = build_clusters(&snap, 169);
        assert!(set.cluster_of(2).is_none());
    }

    #[test]
    fn test_weighted_centroid_counts_casters_thrice() {
        let snap = snapshot(vec![
            hostile(1, UnitKind::Tank, 0, 0),
            hostile(2, UnitKind::Caster, 8, 0),
        ]);
        assert_eq!(weighted_centroid(&snap, &[1, 2]), Some(GridPos::new(6, 0)));
        assert_eq!(weighted_centroid(&snap, &[99]), None);
    }

    #[test]
    fn test_site_cluster_near() {
        let snap = snapshot(vec![hostile(10, UnitKind::Site, 50, 50)]);
        let set = build_clusters(&snap, 169);
        assert_eq!(set.site_cluster_near(&snap, GridPos::new(52, 50), 16), Some(0));
        assert_eq!(set.site_cluster_near(&snap, GridPos::new(60, 50), 16), None);
    }
}
