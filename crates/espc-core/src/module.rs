//! # Data Modules
//!
//! A data module is the unit freshness is tracked in. Every governed field
//! is attributed to exactly one module through the field catalog, and each
//! committed edit advances that module's last-updated timestamp for the
//! record's project.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The data modules of an ESPC project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataModule {
    /// Project header: name, phase, contract dates.
    Project,
    /// Building inventory.
    Buildings,
    /// Equipment and asset register.
    Assets,
    /// Utility bill history.
    UtilityBills,
    /// Energy conservation measures.
    Ecms,
    /// Work tasks and action items.
    Tasks,
    /// Construction submittals.
    Submittals,
    /// Site inspections and findings.
    Inspections,
    /// Measurement & verification baseline and reporting data.
    MeasurementVerification,
    /// Cash flows, pricing and financing schedules.
    Financials,
    /// Generated reports and deliverables.
    Reports,
}

impl DataModule {
    /// All modules, in declaration order.
    pub const ALL: [DataModule; 11] = [
        DataModule::Project,
        DataModule::Buildings,
        DataModule::Assets,
        DataModule::UtilityBills,
        DataModule::Ecms,
        DataModule::Tasks,
        DataModule::Submittals,
        DataModule::Inspections,
        DataModule::MeasurementVerification,
        DataModule::Financials,
        DataModule::Reports,
    ];

    /// Return the string identifier of this module.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Buildings => "buildings",
            Self::Assets => "assets",
            Self::UtilityBills => "utility_bills",
            Self::Ecms => "ecms",
            Self::Tasks => "tasks",
            Self::Submittals => "submittals",
            Self::Inspections => "inspections",
            Self::MeasurementVerification => "measurement_verification",
            Self::Financials => "financials",
            Self::Reports => "reports",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Buildings => "Buildings",
            Self::Assets => "Assets",
            Self::UtilityBills => "Utility Bills",
            Self::Ecms => "ECMs",
            Self::Tasks => "Tasks",
            Self::Submittals => "Submittals",
            Self::Inspections => "Inspections",
            Self::MeasurementVerification => "M&V",
            Self::Financials => "Financials",
            Self::Reports => "Reports",
        }
    }
}

impl std::fmt::Display for DataModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataModule {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "data module",
                value: s.to_string(),
            })
    }
}
