//! Headless scenario runner for the tactics core.
//!
//! Loads a RON scenario, plays both sides with a [`Commander`] against a
//! movement-only [`MovementWorld`] and exposes the resulting command log.
//! This enables:
//!
//! - **Behavior review**: read every order a match produced, round by round
//! - **CI verification**: scenarios must play out without aborted rounds
//! - **Determinism checks**: the same scenario and seed give the same log
//!
//! # Output
//!
//! - **stdout**: one JSON object per issued order ([`LogEntry`])
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! cargo run -p tactics_headless -- run --scenario crates/tactics_headless/scenarios/skirmish.ron
//! cargo run -p tactics_headless -- check-config tactics.ron
//! ```
//!
//! [`Commander`]: tactics_core::orchestrator::Commander

pub mod runner;
pub mod scenario;
pub mod world;

pub use runner::{resolve_config, HeadlessRunner, RunSummary};
pub use scenario::{Scenario, ScenarioError, UnitPlacement, UnitStats};
pub use world::{LogEntry, MovementWorld};
