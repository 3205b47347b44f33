//! Own-side unit tracking.
//!
//! Each own unit gets a [`TrackedUnit`] the first time it is seen. The entry
//! outlives the unit's presence in any single snapshot and carries the role,
//! the squad back-reference and the acted-round guard.

use std::collections::BTreeMap;

use crate::snapshot::{EntityId, UnitKind, UnitRecord};
use crate::squads::SquadId;

/// Per-unit command policy, chosen once from the unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Role {
    /// Default attack and move.
    Fighter,
    /// Stuns the most dangerous target in reach.
    Tank,
    /// Keeps near the squad, blinks to regroup.
    Caster,
    /// Sacrifices itself when it is safe and worth it.
    Berserker,
    /// Places wards at contested sites.
    Scout,
}

impl Role {
    /// Role for a unit kind.
    #[must_use]
    pub const fn for_kind(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Tank => Self::Tank,
            UnitKind::Caster => Self::Caster,
            UnitKind::Berserker => Self::Berserker,
            UnitKind::Scout => Self::Scout,
            _ => Self::Fighter,
        }
    }
}

/// Decision state kept for one own unit across rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedUnit {
    id: EntityId,
    role: Role,
    squad: Option<SquadId>,
    acted_round: Option<u32>,
}

impl TrackedUnit {
    /// Unit id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Command policy.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Squad this unit belongs to.
    #[must_use]
    pub const fn squad(&self) -> Option<SquadId> {
        self.squad
    }

    /// Whether the unit already received a command in `round`.
    #[must_use]
    pub fn acted_in(&self, round: u32) -> bool {
        self.acted_round == Some(round)
    }
}

/// Arena of tracked units keyed by id.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: BTreeMap<EntityId, TrackedUnit>,
}

impl UnitRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracked entry for a record, created on first sight.
    pub fn track(&mut self, record: &UnitRecord) -> &mut TrackedUnit {
        self.units.entry(record.id).or_insert_with(|| {
            tracing::debug!(unit = record.id, kind = ?record.kind, "Tracking new unit");
            TrackedUnit {
                id: record.id,
                role: Role::for_kind(record.kind),
                squad: None,
                acted_round: None,
            }
        })
    }

    /// Tracked entry by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&TrackedUnit> {
        self.units.get(&id)
    }

    /// Role of a unit; untracked units fight.
    #[must_use]
    pub fn role(&self, id: EntityId) -> Role {
        self.units.get(&id).map_or(Role::Fighter, TrackedUnit::role)
    }

    /// Squad of a unit.
    #[must_use]
    pub fn squad_of(&self, id: EntityId) -> Option<SquadId> {
        self.units.get(&id).and_then(TrackedUnit::squad)
    }

    /// Whether the unit already acted in `round`.
    #[must_use]
    pub fn acted_in(&self, id: EntityId, round: u32) -> bool {
        self.units.get(&id).is_some_and(|u| u.acted_in(round))
    }

    /// Record that the unit acted in `round`.
    pub fn mark_acted(&mut self, id: EntityId, round: u32) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.acted_round = Some(round);
        }
    }

    pub(crate) fn set_squad(&mut self, id: EntityId, squad: Option<SquadId>) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.squad = squad;
        }
    }

    /// Iterate tracked units in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedUnit> {
        self.units.values()
    }

    /// Number of tracked units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
