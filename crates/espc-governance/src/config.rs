//! # Governance Configuration
//!
//! Static configuration loaded once at startup and validated before the
//! engine is built. A malformed document is a [`ConfigError`], never a
//! runtime fault.
//!
//! ```yaml
//! min_justification_chars: 10
//! freshness:
//!   - { module: assets, amber_threshold_days: 14, red_threshold_days: 30 }
//! completeness:
//!   - { id: has_assets, gap: No assets captured, metric: assets, at_least: 1 }
//! fields:
//!   - entity_type: asset
//!     module: assets
//!     fields: [name, make, model]
//! ```
//!
//! Omitted sections fall back to [`GovernanceConfig::standard`]. An empty
//! `completeness` list also falls back to the standard check set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use espc_core::{ConfigError, DataModule, EntityType, EspcError};

use crate::completeness::{CheckSet, CompletenessCheck};
use crate::freshness::{FreshnessConfig, FreshnessTable};

/// Minimum trimmed justification length in the reference configuration.
pub const DEFAULT_MIN_JUSTIFICATION_CHARS: usize = 10;

/// The editable fields of one entity type and the module that owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroup {
    /// Entity type.
    pub entity_type: EntityType,
    /// Module whose freshness an edit to these fields refreshes.
    pub module: DataModule,
    /// Editable field names.
    pub fields: Vec<String>,
}

/// The editable-field capability catalog.
///
/// Only fields listed here can be edited through the engine. Each field is
/// attributed to exactly one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldCatalog {
    groups: Vec<FieldGroup>,
}

impl FieldCatalog {
    /// Validate a catalog.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateField`] if an `(entity_type, field)` pair is
    /// listed twice.
    pub fn new(groups: Vec<FieldGroup>) -> Result<Self, ConfigError> {
        let mut seen = std::collections::BTreeSet::new();
        for group in &groups {
            for field in &group.fields {
                if !seen.insert((group.entity_type.as_str(), field.as_str())) {
                    return Err(ConfigError::DuplicateField {
                        entity_type: group.entity_type.to_string(),
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(Self { groups })
    }

    /// The module owning `field` of `entity_type`, if the field is governed.
    pub fn module_for(&self, entity_type: &EntityType, field: &str) -> Option<DataModule> {
        self.groups
            .iter()
            .find(|g| &g.entity_type == entity_type && g.fields.iter().any(|f| f == field))
            .map(|g| g.module)
    }

    /// Configured groups, in configuration order.
    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    /// The reference catalog.
    pub fn standard() -> Self {
        fn group(entity_type: &str, module: DataModule, fields: &[&str]) -> Option<FieldGroup> {
            Some(FieldGroup {
                entity_type: EntityType::new(entity_type).ok()?,
                module,
                fields: fields.iter().map(|f| f.to_string()).collect(),
            })
        }
        let groups = [
            group("project", DataModule::Project, &["name", "phase", "customer", "contract_value", "status"]),
            group("building", DataModule::Buildings, &["name", "address", "gross_floor_area", "year_built", "use_type"]),
            group(
                "asset",
                DataModule::Assets,
                &["name", "make", "model", "serial_number", "condition", "install_year", "location"],
            ),
            group("utility_bill", DataModule::UtilityBills, &["period", "kwh", "demand_kw", "cost"]),
            group(
                "ecm",
                DataModule::Ecms,
                &["name", "description", "cost", "savings_kwh", "savings_usd", "status"],
            ),
            group("task", DataModule::Tasks, &["title", "status", "assignee", "due_date"]),
            group("submittal", DataModule::Submittals, &["title", "status", "spec_section"]),
            group("inspection_finding", DataModule::Inspections, &["description", "severity", "status"]),
            group(
                "mv_baseline",
                DataModule::MeasurementVerification,
                &["period", "baseline_kwh", "adjusted_kwh", "method"],
            ),
            group("financial", DataModule::Financials, &["interest_rate", "term_years", "escalation"]),
            group("report", DataModule::Reports, &["title", "status"]),
        ];
        Self {
            groups: groups.into_iter().flatten().collect(),
        }
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'de> Deserialize<'de> for FieldCatalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let groups = Vec::<FieldGroup>::deserialize(deserializer)?;
        Self::new(groups).map_err(serde::de::Error::custom)
    }
}

/// Reference freshness thresholds, in module order.
pub fn standard_freshness() -> FreshnessTable {
    let pairs = [
        (DataModule::Project, 30, 90),
        (DataModule::Buildings, 90, 180),
        (DataModule::Assets, 14, 30),
        (DataModule::UtilityBills, 35, 70),
        (DataModule::Ecms, 30, 60),
        (DataModule::Tasks, 7, 14),
        (DataModule::Submittals, 14, 30),
        (DataModule::Inspections, 14, 30),
        (DataModule::MeasurementVerification, 30, 90),
        (DataModule::Financials, 30, 90),
        (DataModule::Reports, 30, 90),
    ];
    let configs = pairs
        .into_iter()
        .map(|(module, amber, red)| FreshnessConfig {
            module,
            amber_threshold_days: amber,
            red_threshold_days: red,
        })
        .collect();
    FreshnessTable::new(configs).unwrap_or_default()
}

/// Validated governance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernanceConfig {
    /// Per-module freshness thresholds.
    pub freshness: FreshnessTable,
    /// Ordered completeness checks.
    pub completeness: CheckSet,
    /// Editable-field catalog.
    pub fields: FieldCatalog,
    /// Minimum trimmed justification length, in characters.
    pub min_justification_chars: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    freshness: Option<FreshnessTable>,
    #[serde(default)]
    completeness: Option<Vec<CompletenessCheck>>,
    #[serde(default)]
    fields: Option<FieldCatalog>,
    #[serde(default)]
    min_justification_chars: Option<usize>,
}

impl GovernanceConfig {
    /// The reference configuration.
    pub fn standard() -> Self {
        Self {
            freshness: standard_freshness(),
            completeness: CheckSet::standard(),
            fields: FieldCatalog::standard(),
            min_justification_chars: DEFAULT_MIN_JUSTIFICATION_CHARS,
        }
    }

    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] wraps syntax errors and the invariant
    /// violations detected while deserializing sections;
    /// [`ConfigError::ZeroJustificationMinimum`] for a zero minimum.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let completeness = match raw.completeness {
            Some(checks) if !checks.is_empty() => CheckSet::new(checks)?,
            _ => CheckSet::standard(),
        };
        let config = Self {
            freshness: raw.freshness.unwrap_or_else(standard_freshness),
            completeness,
            fields: raw.fields.unwrap_or_default(),
            min_justification_chars: raw
                .min_justification_chars
                .unwrap_or(DEFAULT_MIN_JUSTIFICATION_CHARS),
        };
        config.validate()?;
        tracing::debug!(
            modules = config.freshness.configs().len(),
            checks = config.completeness.checks().len(),
            entity_types = config.fields.groups().len(),
            "governance configuration loaded"
        );
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EspcError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::from_yaml_str(&text)?)
    }

    /// Re-check every invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_justification_chars == 0 {
            return Err(ConfigError::ZeroJustificationMinimum);
        }
        FreshnessTable::new(self.freshness.configs().to_vec())?;
        CheckSet::new(self.completeness.checks().to_vec())?;
        FieldCatalog::new(self.fields.groups().to_vec())?;
        Ok(())
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espc_core::ProjectPhase;

    #[test]
    fn standard_is_valid() {
        let config = GovernanceConfig::standard();
        assert!(config.validate().is_ok());
        assert_eq!(config.freshness.configs().len(), DataModule::ALL.len());
        assert_eq!(config.min_justification_chars, 10);
    }

    #[test]
    fn empty_document_is_standard() {
        assert_eq!(GovernanceConfig::from_yaml_str("{}").unwrap(), GovernanceConfig::standard());
    }

    #[test]
    fn empty_completeness_falls_back() {
        let config = GovernanceConfig::from_yaml_str("completeness: []").unwrap();
        assert_eq!(config.completeness, CheckSet::standard());
    }

    #[test]
    fn non_increasing_thresholds_rejected_at_load() {
        let yaml = "freshness:\n  - module: assets\n    amber_threshold_days: 30\n    red_threshold_days: 14\n";
        let err = GovernanceConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("amber < red")));
    }

    #[test]
    fn check_with_both_bounds_rejected_at_load() {
        let yaml = "completeness:\n  - { id: findings, gap: Open findings, metric: open_inspection_findings, at_least: 1, at_most: 0 }\n";
        let err = GovernanceConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("mutually exclusive")));
    }

    #[test]
    fn unknown_module_rejected_at_load() {
        let yaml = "freshness:\n  - module: spaceships\n    amber_threshold_days: 1\n    red_threshold_days: 2\n";
        assert!(GovernanceConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn zero_minimum_rejected() {
        assert_eq!(
            GovernanceConfig::from_yaml_str("min_justification_chars: 0").unwrap_err(),
            ConfigError::ZeroJustificationMinimum
        );
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(GovernanceConfig::from_yaml_str("thresholds: []").is_err());
    }

    #[test]
    fn custom_sections_replace_standard() {
        let yaml = r#"
min_justification_chars: 20
freshness:
  - { module: tasks, amber_threshold_days: 3, red_threshold_days: 7 }
completeness:
  - { id: has_ecms, gap: No ECMs defined, metric: ecms, at_least: 1, applies_from: development }
fields:
  - entity_type: task
    module: tasks
    fields: [title, status]
"#;
        let config = GovernanceConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.min_justification_chars, 20);
        assert_eq!(config.freshness.configs().len(), 1);
        assert_eq!(config.completeness.applicable(ProjectPhase::Audit).count(), 0);
        let task = EntityType::new("task").unwrap();
        assert_eq!(config.fields.module_for(&task, "status"), Some(DataModule::Tasks));
        assert_eq!(config.fields.module_for(&task, "assignee"), None);
    }

    #[test]
    fn duplicate_field_rejected() {
        let yaml = "fields:\n  - { entity_type: asset, module: assets, fields: [make] }\n  - { entity_type: asset, module: tasks, fields: [make] }\n";
        let err = GovernanceConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("asset.make")));
    }

    #[test]
    fn standard_catalog_attributes_fields() {
        let catalog = FieldCatalog::standard();
        let project = EntityType::new("project").unwrap();
        assert_eq!(catalog.module_for(&project, "phase"), Some(DataModule::Project));
        let asset = EntityType::new("asset").unwrap();
        assert_eq!(catalog.module_for(&asset, "make"), Some(DataModule::Assets));
        assert_eq!(catalog.module_for(&asset, "owner"), None);
    }
}
