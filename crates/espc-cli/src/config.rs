//! # Config Subcommand
//!
//! Validates a governance configuration file and prints a summary of what it
//! configures. An invalid document is a check failure (exit 1); an unreadable
//! file is an operational error.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use espc_core::{ConfigError, EspcError};
use espc_governance::GovernanceConfig;

/// Arguments for the `espc config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// `espc config` operations.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a configuration file.
    Check {
        /// Path to the governance YAML file.
        #[arg(value_name = "CONFIG_YAML")]
        path: PathBuf,
    },
    /// Print the standard configuration as YAML.
    Standard,
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs) -> Result<u8> {
    match &args.command {
        ConfigCommand::Check { path } => match GovernanceConfig::load(path) {
            Ok(config) => {
                println!("OK: {}", path.display());
                print!("{}", summarize(&config));
                Ok(0)
            }
            Err(EspcError::Config(e)) => {
                report_invalid(path, &e);
                Ok(1)
            }
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        },
        ConfigCommand::Standard => {
            let yaml = serde_yaml::to_string(&GovernanceConfig::standard())
                .context("failed to render the standard configuration")?;
            print!("{yaml}");
            Ok(0)
        }
    }
}

fn report_invalid(path: &std::path::Path, error: &ConfigError) {
    tracing::warn!(path = %path.display(), %error, "configuration rejected");
    println!("INVALID: {}: {error}", path.display());
}

/// One-line-per-section summary of a configuration.
pub fn summarize(config: &GovernanceConfig) -> String {
    let fields: usize = config.fields.groups().iter().map(|g| g.fields.len()).sum();
    format!(
        "  freshness:     {} modules\n  completeness:  {} checks\n  fields:        {} fields across {} entity types\n  justification: at least {} characters\n",
        config.freshness.configs().len(),
        config.completeness.checks().len(),
        fields,
        config.fields.groups().len(),
        config.min_justification_chars,
    )
}
