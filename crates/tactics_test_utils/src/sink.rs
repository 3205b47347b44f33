//! A command sink that records everything and enforces one order per unit
//! per round.

use std::collections::HashSet;

use tactics_core::error::{Result, TacticsError};
use tactics_core::orders::{CommandSink, Order, SideOrder};
use tactics_core::snapshot::EntityId;

/// Records orders per round.
///
/// A second order to the same unit within one round is refused with
/// [`TacticsError::CommandRejected`] and logged as a violation.
#[derive(Debug, Default)]
pub struct RecordingSink {
    round: u32,
    seen: HashSet<EntityId>,
    /// Every accepted unit order as `(round, unit, order)`.
    pub orders: Vec<(u32, EntityId, Order)>,
    /// Every side-level order as `(round, order)`.
    pub side_orders: Vec<(u32, SideOrder)>,
    /// Units that were sent a second order, as `(round, unit)`.
    pub violations: Vec<(u32, EntityId)>,
}

impl RecordingSink {
    /// Empty sink at round 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording a new round.
    pub fn begin_round(&mut self, round: u32) {
        self.round = round;
        self.seen.clear();
    }

    /// Orders accepted in `round`.
    pub fn orders_in(&self, round: u32) -> impl Iterator<Item = (EntityId, &Order)> {
        self.orders
            .iter()
            .filter(move |(r, _, _)| *r == round)
            .map(|(_, unit, order)| (*unit, order))
    }

    /// The order a unit received in `round`.
    #[must_use]
    pub fn order_for(&self, unit: EntityId, round: u32) -> Option<&Order> {
        self.orders_in(round)
            .find(|(u, _)| *u == unit)
            .map(|(_, order)| order)
    }

    /// Side orders issued in `round`.
    pub fn side_orders_in(&self, round: u32) -> impl Iterator<Item = &SideOrder> {
        self.side_orders
            .iter()
            .filter(move |(r, _)| *r == round)
            .map(|(_, order)| order)
    }
}

impl CommandSink for RecordingSink {
    fn issue(&mut self, unit: EntityId, order: Order) -> Result<()> {
        if !self.seen.insert(unit) {
            tracing::warn!(round = self.round, unit, ?order, "Second order in one round");
            self.violations.push((self.round, unit));
            return Err(TacticsError::CommandRejected {
                unit,
                reason: format!("second order in round {}", self.round),
            });
        }
        self.orders.push((self.round, unit, order));
        Ok(())
    }

    fn issue_side(&mut self, order: SideOrder) -> Result<()> {
        self.side_orders.push((self.round, order));
        Ok(())
    }
}
