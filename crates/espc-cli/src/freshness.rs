//! # Freshness Subcommand
//!
//! Evaluates one module's freshness from a last-updated timestamp and the
//! configured thresholds.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use espc_core::{DataModule, Timestamp};
use espc_governance::FreshnessReading;

/// Arguments for the `espc freshness` subcommand.
#[derive(Args, Debug)]
pub struct FreshnessArgs {
    /// Module to evaluate (e.g. `assets`, `utility_bills`).
    #[arg(long)]
    pub module: String,

    /// When the module was last updated (RFC 3339, UTC). Omit for a module
    /// that has never been updated.
    #[arg(long)]
    pub last_updated: Option<String>,

    /// Evaluate as of this instant instead of the current time.
    #[arg(long)]
    pub now: Option<String>,

    /// Governance configuration file. Defaults to the standard configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the reading as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the freshness subcommand.
pub fn run_freshness(args: &FreshnessArgs) -> Result<u8> {
    let reading = evaluate(args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reading)?);
    } else {
        println!("{}", render(&reading));
    }
    Ok(0)
}

/// Compute the reading described by `args`.
pub fn evaluate(args: &FreshnessArgs) -> Result<FreshnessReading> {
    let config = crate::load_config(args.config.as_deref())?;
    let module: DataModule = args
        .module
        .parse()
        .with_context(|| format!("unknown module {:?}", args.module))?;
    let last_updated = args
        .last_updated
        .as_deref()
        .map(Timestamp::parse_lenient)
        .transpose()
        .context("invalid --last-updated")?;
    let now = match args.now.as_deref() {
        Some(s) => Timestamp::parse_lenient(s).context("invalid --now")?,
        None => Timestamp::now(),
    };
    if config.freshness.get(module).is_none() {
        tracing::warn!(%module, "no freshness thresholds configured for module");
    }
    Ok(config.freshness.evaluate(module, last_updated, now))
}

/// Human-readable rendering of one reading.
pub fn render(reading: &FreshnessReading) -> String {
    let label = reading.module.label();
    match (&reading.status, &reading.age) {
        (Some(status), Some(age)) => format!("{label}: {status} (updated {age})"),
        (None, Some(age)) => format!("{label}: no status (updated {age}, no thresholds configured)"),
        _ => format!("{label}: no status (never updated)"),
    }
}
