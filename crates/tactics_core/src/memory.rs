//! State remembered across rounds about things not always in view.

use std::collections::BTreeMap;

use crate::config::MapLayout;
use crate::math::GridPos;
use crate::snapshot::{EntityId, Snapshot, UnitKind};

/// Where and when a hostile was last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting {
    /// Last known cell.
    pub position: GridPos,
    /// Round of the sighting.
    pub round: u32,
    /// Kind at the time.
    pub kind: UnitKind,
}

/// Last-seen positions of hostile units.
#[derive(Debug, Clone, Default)]
pub struct EnemyMemory {
    sightings: BTreeMap<EntityId, Sighting>,
    retention: u32,
}

impl EnemyMemory {
    /// Memory keeping sightings for `retention` rounds.
    #[must_use]
    pub fn new(retention: u32) -> Self {
        Self {
            sightings: BTreeMap::new(),
            retention,
        }
    }

    /// Record every visible, alive, non-reviving hostile that is not a base
    /// or a mining site, and forget sightings past retention.
    pub fn observe(&mut self, snap: &Snapshot) {
        for unit in snap.hostile_units() {
            if !unit.is_active() || matches!(unit.kind, UnitKind::Base | UnitKind::Site) {
                continue;
            }
            self.sightings.insert(
                unit.id,
                Sighting {
                    position: unit.position,
                    round: snap.round,
                    kind: unit.kind,
                },
            );
        }
        let oldest = snap.round.saturating_sub(self.retention);
        self.sightings.retain(|_, s| s.round >= oldest);
    }

    /// Sightings no older than the retention window at `round`.
    pub fn recent(&self, round: u32) -> impl Iterator<Item = (EntityId, &Sighting)> {
        let oldest = round.saturating_sub(self.retention);
        self.sightings
            .iter()
            .filter(move |(_, s)| s.round >= oldest)
            .map(|(&id, s)| (id, s))
    }

    /// Last known position of a hostile.
    #[must_use]
    pub fn position_of(&self, id: EntityId, round: u32) -> Option<GridPos> {
        let oldest = round.saturating_sub(self.retention);
        self.sightings
            .get(&id)
            .filter(|s| s.round >= oldest)
            .map(|s| s.position)
    }

    /// Remembered hostiles inside a disc.
    #[must_use]
    pub fn count_near(&self, center: GridPos, radius2: i64, round: u32) -> usize {
        self.recent(round)
            .filter(|(_, s)| s.position.within(center, radius2))
            .count()
    }

    /// Number of sightings held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sightings.len()
    }

    /// Whether nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty()
    }
}

/// Estimated remaining energy of each mining site.
#[derive(Debug, Clone, Default)]
pub struct MineLedger {
    energy: BTreeMap<GridPos, i32>,
}

impl MineLedger {
    /// Seed the ledger: the central site starts full, the rest empty.
    #[must_use]
    pub fn new(layout: &MapLayout) -> Self {
        let full = i32::try_from(layout.max_rounds.saturating_mul(2)).unwrap_or(i32::MAX);
        let energy = layout
            .sites
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, if i == 0 { full } else { 0 }))
            .collect();
        Self { energy }
    }

    /// Decay every estimate by one, then overwrite with visible sites.
    pub fn update(&mut self, snap: &Snapshot) {
        for e in self.energy.values_mut() {
            *e = (*e - 1).max(0);
        }
        for site in snap.hostile_units().filter(|u| u.kind == UnitKind::Site) {
            self.energy
                .insert(site.position, site.energy.unwrap_or(0).max(0));
        }
    }

    /// Estimated energy at a site; zero when unknown.
    #[must_use]
    pub fn energy(&self, site: GridPos) -> i32 {
        self.energy.get(&site).copied().unwrap_or(0)
    }
}

/// Intrusion alarm around the home base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alarm {
    raised: Option<u32>,
    duration: u32,
}

impl Alarm {
    /// Alarm staying raised for `duration` rounds after the last intrusion.
    #[must_use]
    pub const fn new(duration: u32) -> Self {
        Self {
            raised: None,
            duration,
        }
    }

    /// Raise the alarm if any alive hostile combatant is within `radius2` of
    /// `home`.
    pub fn check(&mut self, snap: &Snapshot, home: GridPos, radius2: i64) {
        let intruder = snap
            .hostiles_within(home, radius2)
            .find(|u| !matches!(u.kind, UnitKind::Site | UnitKind::Ward));
        if let Some(unit) = intruder {
            if !self.is_active(snap.round) {
                tracing::info!(round = snap.round, side = ?snap.side, intruder = unit.id, "Base alarm raised");
            }
            self.raised = Some(snap.round);
        }
    }

    /// Whether the alarm is up in `round`.
    #[must_use]
    pub fn is_active(&self, round: u32) -> bool {
        self.raised
            .is_some_and(|r| round >= r && round - r <= self.duration)
    }
}
