//! # Freshness Evaluator
//!
//! Derives how stale a data module is from its last-updated timestamp and
//! the module's configured thresholds. Pure and total; never stored.
//!
//! ```text
//! days = floor((now - last_updated) / 1 day)
//! red    if days >= red_threshold_days
//! amber  if days >= amber_threshold_days
//! fresh  otherwise
//! ```
//!
//! Status is monotonic in `days`: with config fixed, an older timestamp never
//! yields a less severe status. Missing data is reported as *no status*
//! (`None`), never as `Fresh`.

use serde::{Deserialize, Serialize};

use espc_core::{ConfigError, DataModule, Timestamp};

/// Per-module staleness thresholds, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// The module these thresholds apply to.
    pub module: DataModule,
    /// Days after which the module turns amber.
    pub amber_threshold_days: u32,
    /// Days after which the module turns red. Must exceed the amber threshold.
    pub red_threshold_days: u32,
}

impl FreshnessConfig {
    /// Build a validated threshold pair.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NonIncreasingThresholds`] unless `amber < red`.
    pub fn new(module: DataModule, amber: u32, red: u32) -> Result<Self, ConfigError> {
        let config = Self {
            module,
            amber_threshold_days: amber,
            red_threshold_days: red,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the `amber < red` invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.amber_threshold_days >= self.red_threshold_days {
            return Err(ConfigError::NonIncreasingThresholds {
                module: self.module.to_string(),
                amber: self.amber_threshold_days,
                red: self.red_threshold_days,
            });
        }
        Ok(())
    }

    /// Status for a given whole-day age.
    pub fn status_for_days(&self, days: i64) -> FreshnessStatus {
        if days >= i64::from(self.red_threshold_days) {
            FreshnessStatus::Red
        } else if days >= i64::from(self.amber_threshold_days) {
            FreshnessStatus::Amber
        } else {
            FreshnessStatus::Fresh
        }
    }
}

/// Staleness category. Ordered by severity: `Fresh < Amber < Red`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    /// Updated within the amber threshold.
    Fresh,
    /// Past the amber threshold.
    Amber,
    /// Past the red threshold.
    Red,
}

impl FreshnessStatus {
    /// Return the string identifier of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Amber => "amber",
            Self::Red => "red",
        }
    }
}

impl std::fmt::Display for FreshnessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluate freshness. `None` when there is no timestamp or no config.
pub fn status(
    last_updated: Option<Timestamp>,
    config: Option<&FreshnessConfig>,
    now: Timestamp,
) -> Option<FreshnessStatus> {
    let last = last_updated?;
    let config = config?;
    Some(config.status_for_days(now.whole_days_since(&last)))
}

/// Relative-age label for a whole-day age.
///
/// Breakpoints: 0 → "today", 1 → "yesterday", < 7 → days, < 30 → weeks,
/// < 365 → months, otherwise years. Negative ages (timestamps in the
/// future) read as "today".
pub fn relative_age(days: i64) -> String {
    match days {
        d if d <= 0 => "today".to_string(),
        1 => "yesterday".to_string(),
        d if d < 7 => format!("{d} days ago"),
        d if d < 30 => plural(d / 7, "week"),
        d if d < 365 => plural(d / 30, "month"),
        d => plural(d / 365, "year"),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Freshness of one module, as surfaced to a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessReading {
    /// The module.
    pub module: DataModule,
    /// Last committed edit attributed to the module, if any.
    pub last_updated: Option<Timestamp>,
    /// Whole days since the last update.
    pub days: Option<i64>,
    /// Derived status; `None` when there is no data or no configuration.
    pub status: Option<FreshnessStatus>,
    /// Relative-age label, e.g. "3 weeks ago".
    pub age: Option<String>,
}

/// Validated set of freshness thresholds, one per module, in configuration
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FreshnessTable {
    configs: Vec<FreshnessConfig>,
}

impl FreshnessTable {
    /// Validate and index a list of thresholds.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NonIncreasingThresholds`] for any `amber >= red`.
    /// - [`ConfigError::DuplicateModule`] if a module appears twice.
    pub fn new(configs: Vec<FreshnessConfig>) -> Result<Self, ConfigError> {
        for (i, config) in configs.iter().enumerate() {
            config.validate()?;
            if configs[..i].iter().any(|c| c.module == config.module) {
                return Err(ConfigError::DuplicateModule(config.module.to_string()));
            }
        }
        Ok(Self { configs })
    }

    /// Thresholds for `module`, if configured.
    pub fn get(&self, module: DataModule) -> Option<&FreshnessConfig> {
        self.configs.iter().find(|c| c.module == module)
    }

    /// Configured thresholds, in configuration order.
    pub fn configs(&self) -> &[FreshnessConfig] {
        &self.configs
    }

    /// Evaluate one module.
    pub fn evaluate(
        &self,
        module: DataModule,
        last_updated: Option<Timestamp>,
        now: Timestamp,
    ) -> FreshnessReading {
        let days = last_updated.map(|t| now.whole_days_since(&t));
        if let Some(d) = days.filter(|d| *d < 0) {
            tracing::warn!(%module, days = d, "module last-updated timestamp is in the future");
        }
        FreshnessReading {
            module,
            last_updated,
            days,
            status: status(last_updated, self.get(module), now),
            age: days.map(relative_age),
        }
    }

    /// Evaluate every configured module, in configuration order.
    pub fn report(
        &self,
        last_updated: impl Fn(DataModule) -> Option<Timestamp>,
        now: Timestamp,
    ) -> Vec<FreshnessReading> {
        self.configs
            .iter()
            .map(|c| self.evaluate(c.module, last_updated(c.module), now))
            .collect()
    }
}

impl<'de> Deserialize<'de> for FreshnessTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let configs = Vec::<FreshnessConfig>::deserialize(deserializer)?;
        Self::new(configs).map_err(serde::de::Error::custom)
    }
}
