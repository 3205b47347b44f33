//! Outbound orders and the sink they are issued to.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::GridPos;
use crate::snapshot::{Ability, EntityId, UnitKind};

/// How a move should be routed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Route {
    /// Engine's own shortest path.
    #[default]
    Shortest,
    /// Follow these waypoints, computed to keep clear of remembered enemies.
    HazardAware {
        /// Cells to pass through, ending nearest the destination.
        waypoints: Vec<GridPos>,
    },
}

/// Target of an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityTarget {
    /// Self-cast.
    None,
    /// A unit.
    Unit(EntityId),
    /// A cell.
    Point(GridPos),
}

/// A command for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Walk toward a cell.
    Move {
        /// Destination.
        to: GridPos,
        /// Routing.
        route: Route,
    },
    /// Attack a unit.
    Attack {
        /// Target unit.
        target: EntityId,
    },
    /// Use an ability.
    Cast {
        /// Ability.
        ability: Ability,
        /// Target.
        target: AbilityTarget,
    },
}

impl Order {
    /// Plain move along the engine's shortest path.
    #[must_use]
    pub const fn move_to(to: GridPos) -> Self {
        Self::Move {
            to,
            route: Route::Shortest,
        }
    }

    /// Destination if this is a move.
    #[must_use]
    pub const fn destination(&self) -> Option<GridPos> {
        match self {
            Self::Move { to, .. } => Some(*to),
            _ => None,
        }
    }
}

/// A side-level command: purchases and base actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideOrder {
    /// Hire a hero of this kind.
    Hire(UnitKind),
    /// Raise a unit's level.
    LevelUp(EntityId),
    /// Revive a unit early.
    BuyBack(EntityId),
    /// Point the base's auto-attack at a unit.
    BaseAttack(EntityId),
}

/// Receives the core's orders. Implemented by the engine adapter.
pub trait CommandSink {
    /// Issue an order to one unit.
    fn issue(&mut self, unit: EntityId, order: Order) -> Result<()>;

    /// Issue a side-level order.
    fn issue_side(&mut self, order: SideOrder) -> Result<()>;
}
