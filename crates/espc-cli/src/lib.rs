//! # espc-cli: Command Line Interface for the ESPC Governance Engine
//!
//! Provides the `espc` binary. Handlers live here so they can be tested
//! without spawning a process.
//!
//! ## Subcommands
//!
//! - `espc config check`: Load and validate a governance configuration.
//! - `espc freshness`: Evaluate one module's freshness.
//! - `espc completeness`: Score a project phase against record counts.
//! - `espc replay`: Run a scenario file through the engine.
//!
//! ```bash
//! espc config check config/governance.yaml
//! espc freshness --module assets --last-updated 2026-05-01T00:00:00Z
//! espc completeness --phase audit --count utility_bill_months=12 --count ecms=1
//! espc replay config/demo-scenario.yaml
//! ```
//!
//! Exit codes: 0 success, 1 check or scenario failure, 2 operational error.

pub mod completeness;
pub mod config;
pub mod freshness;
pub mod replay;

use std::path::Path;

use anyhow::{Context, Result};

use espc_governance::GovernanceConfig;

/// Load a configuration file, or the standard configuration when no path is
/// given.
pub fn load_config(path: Option<&Path>) -> Result<GovernanceConfig> {
    match path {
        Some(path) => GovernanceConfig::load(path)
            .with_context(|| format!("failed to load configuration: {}", path.display())),
        None => {
            tracing::debug!("no configuration given; using the standard configuration");
            Ok(GovernanceConfig::standard())
        }
    }
}
