//! Mining-site reservations.
//!
//! A squad that commits to a site records a claim so no other squad of the
//! same side targets it. A position has at most one claimant; only the
//! claimant can release it.

use std::collections::BTreeMap;

use crate::math::GridPos;
use crate::squads::SquadId;

/// Position to claimant squad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimTable {
    claims: BTreeMap<GridPos, SquadId>,
}

impl ClaimTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `pos` for `squad`. Fails if another squad holds it.
    pub fn claim(&mut self, pos: GridPos, squad: SquadId) -> bool {
        match self.claims.get(&pos) {
            Some(&holder) if holder != squad => {
                tracing::debug!(?pos, ?squad, ?holder, "Claim refused, site already held");
                false
            }
            Some(_) => true,
            None => {
                tracing::debug!(?pos, ?squad, "Registered site claim");
                self.claims.insert(pos, squad);
                true
            }
        }
    }

    /// Release `pos` if `squad` holds it.
    pub fn release(&mut self, pos: GridPos, squad: SquadId) -> bool {
        if self.claims.get(&pos) == Some(&squad) {
            self.claims.remove(&pos);
            tracing::debug!(?pos, ?squad, "Released site claim");
            true
        } else {
            false
        }
    }

    /// Hand a claim from one squad to another.
    pub fn transfer(&mut self, pos: GridPos, from: SquadId, to: SquadId) -> bool {
        match self.claims.get_mut(&pos) {
            Some(holder) if *holder == from => {
                *holder = to;
                tracing::debug!(?pos, ?from, ?to, "Transferred site claim");
                true
            }
            _ => false,
        }
    }

    /// Drop every claim a squad holds.
    pub fn release_all(&mut self, squad: SquadId) {
        self.claims.retain(|_, holder| *holder != squad);
    }

    /// Current claimant of `pos`.
    #[must_use]
    pub fn holder(&self, pos: GridPos) -> Option<SquadId> {
        self.claims.get(&pos).copied()
    }

    /// Whether `pos` is held by anyone.
    #[must_use]
    pub fn is_claimed(&self, pos: GridPos) -> bool {
        self.claims.contains_key(&pos)
    }

    /// Whether `pos` is held by a squad other than `squad`.
    #[must_use]
    pub fn is_claimed_by_other(&self, pos: GridPos, squad: SquadId) -> bool {
        self.claims.get(&pos).is_some_and(|&h| h != squad)
    }

    /// Iterate claims in position order.
    pub fn iter(&self) -> impl Iterator<Item = (GridPos, SquadId)> + '_ {
        self.claims.iter().map(|(&p, &s)| (p, s))
    }

    /// Number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether nothing is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: GridPos = GridPos::new(75, 75);

    #[test]
    fn test_second_claimant_refused() {
        let mut table = ClaimTable::new();
        assert!(table.claim(SITE, SquadId(1)));
        assert!(!table.claim(SITE, SquadId(2)));
        assert_eq!(table.holder(SITE), Some(SquadId(1)));
        // Re-claiming your own site is fine.
        assert!(table.claim(SITE, SquadId(1)));
    }

    #[test]
    fn test_only_holder_releases() {
        let mut table = ClaimTable::new();
        table.claim(SITE, SquadId(1));
        assert!(!table.release(SITE, SquadId(2)));
        assert!(table.is_claimed(SITE));
        assert!(table.release(SITE, SquadId(1)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_transfer() {
        let mut table = ClaimTable::new();
        table.claim(SITE, SquadId(1));
        assert!(!table.transfer(SITE, SquadId(3), SquadId(2)));
        assert!(table.transfer(SITE, SquadId(1), SquadId(2)));
        assert_eq!(table.holder(SITE), Some(SquadId(2)));
        assert!(table.is_claimed_by_other(SITE, SquadId(1)));
    }

    #[test]
    fn test_release_all() {
        let mut table = ClaimTable::new();
        table.claim(SITE, SquadId(1));
        table.claim(GridPos::new(1, 1), SquadId(1));
        table.claim(GridPos::new(2, 2), SquadId(2));
        table.release_all(SquadId(1));
        assert_eq!(table.len(), 1);
    }
}
