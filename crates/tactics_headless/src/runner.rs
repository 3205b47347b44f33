//! Headless match runner.
//!
//! Plays a scenario round by round: each side gets a snapshot of the
//! [`MovementWorld`], the [`Commander`] decides its orders, then the world
//! advances.

use std::path::Path;

use tactics_core::config::TacticsConfig;
use tactics_core::orchestrator::{Commander, RoundReport};
use tactics_core::pathing::NavGrid;
use tactics_core::snapshot::Side;

use crate::scenario::{Scenario, ScenarioError};
use crate::world::{LogEntry, MovementWorld};

/// Resolve the config for a scenario.
///
/// An explicit `override_path` wins over the scenario's own `config` entry,
/// which is read relative to `scenario_dir`. The scenario seed, when set,
/// replaces the config seed.
pub fn resolve_config(
    scenario: &Scenario,
    scenario_dir: Option<&Path>,
    override_path: Option<&Path>,
) -> Result<TacticsConfig, ScenarioError> {
    let mut config = match (override_path, &scenario.config) {
        (Some(path), _) => TacticsConfig::load(path)?,
        (None, Some(relative)) => {
            let path = scenario_dir.map_or_else(|| Path::new(relative).to_path_buf(), |d| d.join(relative));
            TacticsConfig::load(path)?
        }
        (None, None) => TacticsConfig::default(),
    };
    if let Some(seed) = scenario.seed {
        config.seed = seed;
    }
    Ok(config)
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RunSummary {
    /// Rounds played.
    pub rounds: u32,
    /// Unit orders issued by both sides.
    pub orders: usize,
    /// Side orders issued by both sides.
    pub side_orders: usize,
    /// Rounds a side aborted, as `(round, side, reason)`.
    pub aborted: Vec<(u32, Side, String)>,
}

/// Drives both sides of a scenario.
pub struct HeadlessRunner {
    world: MovementWorld,
    grid: NavGrid,
    commander: Commander,
    reports: Vec<RoundReport>,
}

impl HeadlessRunner {
    /// Set up round 1 of `scenario`.
    #[must_use]
    pub fn new(scenario: &Scenario, config: TacticsConfig) -> Self {
        let world = MovementWorld::new(scenario, &config);
        let grid = world.grid().clone();
        Self {
            world,
            grid,
            commander: Commander::new(config),
            reports: Vec::new(),
        }
    }

    /// The world as of the current round.
    #[must_use]
    pub const fn world(&self) -> &MovementWorld {
        &self.world
    }

    /// Every round report so far, both sides interleaved.
    #[must_use]
    pub fn reports(&self) -> &[RoundReport] {
        &self.reports
    }

    /// Let both sides decide, then advance the world.
    pub fn play_round(&mut self) {
        for side in [Side::First, Side::Second] {
            let snap = self.world.snapshot(side);
            self.world.begin_turn(side);
            let report = self.commander.on_round(&snap, &self.grid, &mut self.world);
            if let Some(reason) = &report.aborted {
                tracing::warn!(round = report.round, ?side, %reason, "Side skipped its round");
            }
            self.reports.push(report);
        }
        self.world.advance();
    }

    /// Play `rounds` rounds and summarize them.
    pub fn run(&mut self, rounds: u32) -> RunSummary {
        tracing::info!(rounds, "Starting headless run");
        for _ in 0..rounds {
            self.play_round();
        }
        let (orders, side_orders) = self
            .world
            .log()
            .iter()
            .fold((0, 0), |(u, s), entry| match entry {
                LogEntry::Unit { .. } => (u + 1, s),
                LogEntry::Side { .. } => (u, s + 1),
            });
        let aborted = self
            .reports
            .iter()
            .filter_map(|r| r.aborted.clone().map(|reason| (r.round, r.side, reason)))
            .collect();
        let summary = RunSummary {
            rounds,
            orders,
            side_orders,
            aborted,
        };
        tracing::info!(
            rounds,
            orders = summary.orders,
            side_orders = summary.side_orders,
            aborted = summary.aborted.len(),
            "Headless run finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relaxed() -> TacticsConfig {
        TacticsConfig {
            round_budget_ms: 60_000,
            ..TacticsConfig::default()
        }
    }

    #[test]
    fn test_skirmish_runs_clean() {
        let mut runner = HeadlessRunner::new(&Scenario::skirmish(), relaxed());
        let summary = runner.run(8);
        assert_eq!(summary.rounds, 8);
        assert!(summary.aborted.is_empty(), "aborted: {:?}", summary.aborted);
        assert!(summary.orders > 0);
        assert_eq!(runner.reports().len(), 16);
        assert_eq!(runner.world().round(), 9);
    }

    #[test]
    fn test_units_move_toward_orders() {
        let mut runner = HeadlessRunner::new(&Scenario::skirmish(), relaxed());
        let before: Vec<_> = runner.world().units().iter().map(|u| u.position).collect();
        runner.run(3);
        let moved = runner
            .world()
            .units()
            .iter()
            .zip(&before)
            .any(|(u, &p)| u.position != p);
        assert!(moved);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let log = |seed| {
            let config = TacticsConfig { seed, ..relaxed() };
            let mut runner = HeadlessRunner::new(&Scenario::skirmish(), config);
            runner.run(6);
            runner.world().log().to_vec()
        };
        assert_eq!(log(3), log(3));
    }

    #[test]
    fn test_scenario_seed_overrides_config() {
        let scenario = Scenario {
            seed: Some(77),
            ..Scenario::skirmish()
        };
        let config = resolve_config(&scenario, None, None).unwrap();
        assert_eq!(config.seed, 77);
    }

    #[test]
    fn test_config_path_relative_to_scenario() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tight.ron"), "(round_budget_ms: 5)").unwrap();
        let scenario = Scenario {
            config: Some("tight.ron".to_string()),
            ..Scenario::skirmish()
        };
        let config = resolve_config(&scenario, Some(dir.path()), None).unwrap();
        assert_eq!(config.round_budget_ms, 5);

        let missing = resolve_config(&scenario, None, Some(Path::new("/no/such.ron")));
        assert!(matches!(missing, Err(ScenarioError::Config(_))));
    }
}
