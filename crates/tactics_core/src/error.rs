//! Error types for the tactics core.

use thiserror::Error;

use crate::snapshot::EntityId;

/// Result type alias using [`TacticsError`].
pub type Result<T> = std::result::Result<T, TacticsError>;

/// Top-level error type for the decision core.
///
/// Scoring and clustering never fail; they degrade to neutral values.
/// These variants cover the fallible seams: the command sink, path search,
/// configuration loading and snapshot validation.
#[derive(Debug, Error)]
pub enum TacticsError {
    /// A unit referenced by the core is absent from the snapshot.
    #[error("Unit not found: {0}")]
    UnitNotFound(EntityId),

    /// The snapshot handed to the core is unusable.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The adapter refused an order.
    #[error("Command rejected for unit {unit}: {reason}")]
    CommandRejected {
        /// Unit the order was addressed to (0 for side-level orders).
        unit: EntityId,
        /// Reason given by the adapter.
        reason: String,
    },

    /// Reading a configuration file failed.
    #[error("Failed to read config '{path}': {message}")]
    ConfigRead {
        /// Path to the file.
        path: String,
        /// Underlying IO message.
        message: String,
    },

    /// Parsing a configuration file failed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// The path search could not produce a path.
    #[error("Path search failed from ({from_x}, {from_y}): {reason}")]
    PathSearch {
        /// Start x.
        from_x: i32,
        /// Start y.
        from_y: i32,
        /// Why the search failed.
        reason: String,
    },

    /// The round budget ran out before the pass completed.
    #[error("Round {round} exceeded its {budget_ms} ms budget")]
    DeadlineExceeded {
        /// Round number.
        round: u32,
        /// Budget in milliseconds.
        budget_ms: u64,
    },
}
