//! # Tactics Core
//!
//! Squad-level decision core for a two-sided grid skirmish bot.
//!
//! Each round the engine adapter hands over a [`snapshot::Snapshot`] of
//! what one side can see. The core groups hostiles into threat clusters,
//! organizes own units into squads, picks one behavior per squad and issues
//! at most one order per unit through a [`orders::CommandSink`].
//!
//! This crate is deterministic given a seed:
//! - No rendering
//! - No IO beyond reading an optional config file
//! - No system randomness (seeded `ChaCha8Rng`)
//! - Fixed-point geometry; scores are `f64` heuristics
//!
//! ## Crate Structure
//!
//! - [`snapshot`] - Per-round world view handed in by the adapter
//! - [`scoring`] - Cached strength, danger, value and positional scores
//! - [`clustering`] - Threat clusters of nearby hostiles
//! - [`squads`] - Squad registry, joins, splits and resets
//! - [`behavior`] - Squad behaviors in priority order
//! - [`orchestrator`] - Per-side context and the round loop
//! - [`pathing`] - A* search and hazard-aware routing
//! - [`config`] - Tunable weights, thresholds and game rules

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod cache;
pub mod claims;
pub mod clustering;
pub mod config;
pub mod error;
pub mod math;
pub mod memory;
pub mod orchestrator;
pub mod orders;
pub mod pathing;
pub mod scoring;
pub mod snapshot;
pub mod squads;
pub mod units;

mod dispatch;
mod economy;
mod regroup;
mod roles;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::behavior::Behavior;
    pub use crate::claims::ClaimTable;
    pub use crate::clustering::{build_clusters, ClusterId, ClusterSet, ThreatCluster};
    pub use crate::config::{GameRules, MapLayout, ScoringWeights, TacticsConfig, Thresholds};
    pub use crate::error::{Result, TacticsError};
    pub use crate::math::{Fixed, GridPos, Vec2Fixed};
    pub use crate::orchestrator::{Commander, RoundReport, TacticalContext};
    pub use crate::orders::{AbilityTarget, CommandSink, Order, Route, SideOrder};
    pub use crate::pathing::{HazardAwarePath, NavGrid, PathSearch};
    pub use crate::scoring::Scorer;
    pub use crate::snapshot::{
        Ability, AbilityState, Economy, Effect, EntityId, HeightMap, Side, Snapshot,
        StatusEffect, UnitKind, UnitRecord,
    };
    pub use crate::squads::{Squad, SquadId, SquadRegistry};
    pub use crate::units::{Role, UnitRegistry};
}
