//! # Project Phases
//!
//! ESPC projects move through a fixed sequence of phases. Completeness
//! checks can be gated to apply "from a phase onward", which relies on the
//! derived ordering:
//!
//! ```text
//! Audit ──▶ Development ──▶ Construction ──▶ MeasurementVerification ──▶ Closeout
//! ```
//!
//! Parsing is case-insensitive and accepts the display labels used on
//! project records (`"Audit"`, `"M&V"`, `"Measurement & Verification"`) as
//! well as the `snake_case` identifiers. Serialization always emits the
//! identifier.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lifecycle phase of an ESPC project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    /// Investment grade energy audit (IGEA) under way.
    Audit,
    /// Contract development and financing.
    Development,
    /// ECM installation.
    Construction,
    /// Post-construction measurement & verification.
    MeasurementVerification,
    /// Contract closeout.
    Closeout,
}

impl ProjectPhase {
    /// All phases, in lifecycle order.
    pub const ALL: [ProjectPhase; 5] = [
        ProjectPhase::Audit,
        ProjectPhase::Development,
        ProjectPhase::Construction,
        ProjectPhase::MeasurementVerification,
        ProjectPhase::Closeout,
    ];

    /// Return the string identifier of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Development => "development",
            Self::Construction => "construction",
            Self::MeasurementVerification => "measurement_verification",
            Self::Closeout => "closeout",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Audit => "Audit",
            Self::Development => "Development",
            Self::Construction => "Construction",
            Self::MeasurementVerification => "M&V",
            Self::Closeout => "Closeout",
        }
    }

    /// Whether this phase is `other` or later.
    pub fn is_at_least(&self, other: ProjectPhase) -> bool {
        *self >= other
    }
}

impl std::fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectPhase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        match key.as_str() {
            "audit" => Ok(Self::Audit),
            "development" => Ok(Self::Development),
            "construction" => Ok(Self::Construction),
            "measurement_verification"
            | "measurement_&_verification"
            | "measurement_and_verification"
            | "m&v"
            | "m_and_v"
            | "mv" => Ok(Self::MeasurementVerification),
            "closeout" | "close_out" => Ok(Self::Closeout),
            _ => Err(ValidationError::UnknownVariant {
                kind: "project phase",
                value: s.to_string(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for ProjectPhase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered() {
        let mut sorted = ProjectPhase::ALL;
        sorted.sort();
        assert_eq!(sorted, ProjectPhase::ALL);
    }

    #[test]
    fn is_at_least_is_inclusive() {
        assert!(ProjectPhase::Construction.is_at_least(ProjectPhase::Construction));
        assert!(ProjectPhase::Closeout.is_at_least(ProjectPhase::Construction));
        assert!(!ProjectPhase::Audit.is_at_least(ProjectPhase::Construction));
    }

    #[test]
    fn aliases_parse() {
        assert_eq!(
            "m_and_v".parse::<ProjectPhase>().unwrap(),
            ProjectPhase::MeasurementVerification
        );
        let from_yaml: ProjectPhase = serde_json::from_str("\"mv\"").unwrap();
        assert_eq!(from_yaml, ProjectPhase::MeasurementVerification);
    }

    #[test]
    fn display_labels_parse_case_insensitively() {
        let cases = [
            ("Audit", ProjectPhase::Audit),
            ("DEVELOPMENT", ProjectPhase::Development),
            ("Construction", ProjectPhase::Construction),
            ("M&V", ProjectPhase::MeasurementVerification),
            ("Measurement & Verification", ProjectPhase::MeasurementVerification),
            ("measurement-verification", ProjectPhase::MeasurementVerification),
            (" Closeout ", ProjectPhase::Closeout),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<ProjectPhase>().unwrap(), expected, "{input}");
        }
        for phase in ProjectPhase::ALL {
            assert_eq!(phase.label().parse::<ProjectPhase>().unwrap(), phase);
        }
    }

    #[test]
    fn deserialize_accepts_labels_and_serializes_identifier() {
        let phase: ProjectPhase = serde_json::from_str("\"M&V\"").unwrap();
        assert_eq!(phase, ProjectPhase::MeasurementVerification);
        assert_eq!(
            serde_json::to_string(&phase).unwrap(),
            "\"measurement_verification\""
        );
        assert!(serde_json::from_str::<ProjectPhase>("\"warranty\"").is_err());
    }

    #[test]
    fn unknown_phase_rejected() {
        assert!("warranty".parse::<ProjectPhase>().is_err());
        assert!("".parse::<ProjectPhase>().is_err());
        assert!("m v x".parse::<ProjectPhase>().is_err());
    }
}
