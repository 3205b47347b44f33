//! Headless tactics runner.
//!
//! Plays a scenario with the tactics core controlling both sides and prints
//! every issued order as a JSON line.
//!
//! # Usage
//!
//! ```bash
//! # Play the built-in skirmish
//! cargo run -p tactics_headless -- run
//!
//! # Play a scenario file for 20 rounds with a custom config
//! cargo run -p tactics_headless -- run --scenario scenarios/skirmish.ron --rounds 20 --config tactics.ron
//!
//! # Validate a config file
//! cargo run -p tactics_headless -- check-config tactics.ron
//! ```
//!
//! Output (stdout): one JSON order per line
//! Logs (stderr): Debug information

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tactics_core::config::TacticsConfig;
use tactics_headless::{resolve_config, HeadlessRunner, Scenario};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless squad tactics runner for behavior review and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario and print the command log
    Run {
        /// Scenario file to load (built-in skirmish when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Rounds to play (scenario default when absent)
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Tactics config file, overriding the scenario's
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a tactics config file
    CheckConfig {
        /// Config file to check
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for the command log)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            rounds,
            config,
        }) => {
            cmd_run(scenario, rounds, config);
        }
        Some(Commands::CheckConfig { file }) => {
            cmd_check_config(file);
        }
        None => {
            // Default: built-in skirmish
            cmd_run(None, None, None);
        }
    }
}

/// Play a scenario
fn cmd_run(scenario_path: Option<PathBuf>, rounds: Option<u32>, config_path: Option<PathBuf>) {
    let scenario = match &scenario_path {
        Some(path) => match Scenario::load(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to load scenario: {}", e);
                std::process::exit(1);
            }
        },
        None => Scenario::skirmish(),
    };

    let scenario_dir = scenario_path.as_deref().and_then(|p| p.parent());
    let config = match resolve_config(&scenario, scenario_dir, config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let rounds = rounds.unwrap_or(scenario.rounds);
    tracing::info!(
        scenario = %scenario.name,
        rounds,
        seed = config.seed,
        "Running scenario"
    );

    let mut runner = HeadlessRunner::new(&scenario, config);
    let summary = runner.run(rounds);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in runner.world().log() {
        if let Err(e) = out.write_all(entry.to_json_line().as_bytes()) {
            eprintln!("Failed to write command log: {}", e);
            std::process::exit(1);
        }
    }
    out.flush().ok();

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("RUN COMPLETE: {}", scenario.name);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Rounds: {}", summary.rounds);
    eprintln!("Unit orders: {}", summary.orders);
    eprintln!("Side orders: {}", summary.side_orders);
    if !summary.aborted.is_empty() {
        eprintln!("Aborted rounds: {}", summary.aborted.len());
        for (round, side, reason) in summary.aborted.iter().take(10) {
            eprintln!("  Round {} ({:?}): {}", round, side, reason);
        }
        std::process::exit(1);
    }
}

/// Validate a config file
fn cmd_check_config(file: PathBuf) {
    tracing::info!("Checking config: {}", file.display());

    match TacticsConfig::load(&file) {
        Ok(config) => {
            eprintln!("OK: {}", file.display());
            eprintln!("  Map size: {}", config.layout.map_size);
            eprintln!("  Sites: {}", config.layout.sites.len());
            eprintln!("  Round budget: {} ms", config.round_budget_ms);
            eprintln!("  Seed: {}", config.seed);
        }
        Err(e) => {
            eprintln!("FAIL: {}", e);
            std::process::exit(1);
        }
    }
}
