//! # Completeness Subcommand
//!
//! Scores a project phase against record counts given on the command line.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;

use espc_core::ProjectPhase;
use espc_governance::{CompletenessReport, RecordCounts, RecordMetric};

/// Arguments for the `espc completeness` subcommand.
#[derive(Args, Debug)]
pub struct CompletenessArgs {
    /// Project phase (`audit`, `development`, `construction`,
    /// `measurement_verification`, `closeout`).
    #[arg(long)]
    pub phase: String,

    /// Metric value as `metric=value`, e.g. `assets=40`. Repeatable; unset
    /// metrics count as zero.
    #[arg(long = "count", value_name = "METRIC=VALUE")]
    pub counts: Vec<String>,

    /// Governance configuration file. Defaults to the standard configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Exit with status 1 when any check is unsatisfied.
    #[arg(long)]
    pub strict: bool,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the completeness subcommand.
pub fn run_completeness(args: &CompletenessArgs) -> Result<u8> {
    let report = evaluate(args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(if args.strict && !report.gaps.is_empty() { 1 } else { 0 })
}

/// Compute the report described by `args`.
pub fn evaluate(args: &CompletenessArgs) -> Result<CompletenessReport> {
    let config = crate::load_config(args.config.as_deref())?;
    let phase: ProjectPhase = args
        .phase
        .parse()
        .with_context(|| format!("unknown phase {:?}", args.phase))?;
    let mut counts = RecordCounts::new();
    for raw in &args.counts {
        let (metric, value) = parse_count(raw)?;
        counts.set(metric, value);
    }
    Ok(config.completeness.score(phase, &counts))
}

/// Parse one `metric=value` pair.
pub fn parse_count(raw: &str) -> Result<(RecordMetric, u64)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected METRIC=VALUE, got {raw:?}"))?;
    let name = name.trim();
    let metric = RecordMetric::ALL
        .into_iter()
        .find(|m| m.as_str() == name)
        .ok_or_else(|| anyhow!("unknown metric {name:?}"))?;
    let value = value
        .trim()
        .parse()
        .with_context(|| format!("invalid count for {name}: {value:?}"))?;
    Ok((metric, value))
}

/// Human-readable rendering of a report.
pub fn render(report: &CompletenessReport) -> String {
    let mut out = format!(
        "{}: {}% ({}/{} checks)\n",
        report.phase, report.score, report.satisfied, report.total
    );
    for gap in &report.gaps {
        out.push_str(&format!("  - {gap}\n"));
    }
    out
}
