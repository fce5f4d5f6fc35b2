//! # espc CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use espc_cli::completeness::{run_completeness, CompletenessArgs};
use espc_cli::config::{run_config, ConfigArgs};
use espc_cli::freshness::{run_freshness, FreshnessArgs};
use espc_cli::replay::{run_replay, ReplayArgs};

/// ESPC data governance CLI
///
/// Validates governance configuration, runs the freshness and completeness
/// evaluators, and replays edit scenarios through the governance engine.
#[derive(Parser, Debug)]
#[command(name = "espc", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate or print governance configuration.
    Config(ConfigArgs),

    /// Evaluate one module's freshness.
    Freshness(FreshnessArgs),

    /// Score a project phase against record counts.
    Completeness(CompletenessArgs),

    /// Replay a scenario file through the governance engine.
    Replay(ReplayArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "espc CLI starting");

    let result = match &cli.command {
        Commands::Config(args) => run_config(args),
        Commands::Freshness(args) => run_freshness(args),
        Commands::Completeness(args) => run_completeness(args),
        Commands::Replay(args) => run_replay(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
