//! # Tactics Test Utilities
//!
//! Shared testing utilities for the tactics crates:
//! - Snapshot and unit fixtures
//! - A recording command sink enforcing one order per unit per round
//! - Determinism harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod sink;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
