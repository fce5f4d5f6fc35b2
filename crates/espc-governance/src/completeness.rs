//! # Completeness Scorer
//!
//! Derives how much of the data a project needs actually exists, given the
//! project's phase. Pure, recomputed on every call, never stored.
//!
//! A [`CheckSet`] is an ordered list of [`CompletenessCheck`]s. Each check is
//! a threshold on one [`RecordMetric`], optionally gated to apply only from
//! a given phase onward. Scoring filters the set to the phase, evaluates
//! every applicable check in order against [`RecordCounts`], and reports:
//!
//! ```text
//! score = round(100 * satisfied / total)      (half-up)
//! gaps  = gap text of every unsatisfied check, in evaluation order
//! ```
//!
//! Counts live in a `BTreeMap` and checks in a `Vec`, so the check set, the
//! score and the gap ordering are identical on every call for the same input.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use espc_core::{ConfigError, ProjectPhase};

use crate::store::Record;

/// A countable property of a project's related records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMetric {
    /// Number of `asset` records.
    Assets,
    /// Number of `building` records.
    Buildings,
    /// Number of `ecm` records.
    Ecms,
    /// Distinct `period` values across `utility_bill` records.
    UtilityBillMonths,
    /// Number of `submittal` records.
    Submittals,
    /// `inspection_finding` records whose `status` is not `resolved`.
    OpenInspectionFindings,
    /// Number of `mv_baseline` records.
    MvBaselinePoints,
}

impl RecordMetric {
    /// All metrics, in declaration order.
    pub const ALL: [RecordMetric; 7] = [
        RecordMetric::Assets,
        RecordMetric::Buildings,
        RecordMetric::Ecms,
        RecordMetric::UtilityBillMonths,
        RecordMetric::Submittals,
        RecordMetric::OpenInspectionFindings,
        RecordMetric::MvBaselinePoints,
    ];

    /// The entity type whose records feed this metric.
    pub fn source_entity_type(&self) -> &'static str {
        match self {
            Self::Assets => "asset",
            Self::Buildings => "building",
            Self::Ecms => "ecm",
            Self::UtilityBillMonths => "utility_bill",
            Self::Submittals => "submittal",
            Self::OpenInspectionFindings => "inspection_finding",
            Self::MvBaselinePoints => "mv_baseline",
        }
    }

    /// Return the string identifier of this metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Buildings => "buildings",
            Self::Ecms => "ecms",
            Self::UtilityBillMonths => "utility_bill_months",
            Self::Submittals => "submittals",
            Self::OpenInspectionFindings => "open_inspection_findings",
            Self::MvBaselinePoints => "mv_baseline_points",
        }
    }
}

impl std::fmt::Display for RecordMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric values for one project. Unset metrics read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordCounts(BTreeMap<RecordMetric, u64>);

impl RecordCounts {
    /// Empty counts (every metric zero).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, metric: RecordMetric, value: u64) -> Self {
        self.set(metric, value);
        self
    }

    /// Set one metric.
    pub fn set(&mut self, metric: RecordMetric, value: u64) {
        self.0.insert(metric, value);
    }

    /// Read one metric.
    pub fn get(&self, metric: RecordMetric) -> u64 {
        self.0.get(&metric).copied().unwrap_or(0)
    }

    /// Tally metrics from a project's records.
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut counts = Self::new();
        let mut bill_periods = BTreeSet::new();
        for record in records {
            let entity_type = record.entity.entity_type.as_str();
            let Some(metric) = RecordMetric::ALL
                .into_iter()
                .find(|m| m.source_entity_type() == entity_type)
            else {
                continue;
            };
            match metric {
                RecordMetric::UtilityBillMonths => {
                    if let Some(period) = record.fields.get("period").and_then(period_key) {
                        bill_periods.insert(period);
                    }
                }
                RecordMetric::OpenInspectionFindings => {
                    if !is_resolved(record.fields.get("status")) {
                        *counts.0.entry(metric).or_insert(0) += 1;
                    }
                }
                _ => *counts.0.entry(metric).or_insert(0) += 1,
            }
        }
        counts.set(RecordMetric::UtilityBillMonths, bill_periods.len() as u64);
        counts
    }
}

fn period_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

fn is_resolved(status: Option<&Value>) -> bool {
    status
        .and_then(Value::as_str)
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("resolved"))
}

/// Threshold a metric must meet for a check to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Metric must be at least this value.
    AtLeast(u64),
    /// Metric must be at most this value.
    AtMost(u64),
}

impl Threshold {
    /// Whether `value` meets the threshold.
    pub fn is_met(&self, value: u64) -> bool {
        match *self {
            Self::AtLeast(n) => value >= n,
            Self::AtMost(n) => value <= n,
        }
    }
}

/// A named predicate over a project's record counts.
///
/// In configuration the threshold is written as exactly one of `at_least`
/// or `at_most`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCheck")]
pub struct CompletenessCheck {
    /// Stable check identifier.
    pub id: String,
    /// Gap text reported when the check fails.
    pub gap: String,
    /// The metric tested.
    pub metric: RecordMetric,
    /// What the metric must satisfy.
    #[serde(flatten)]
    pub threshold: Threshold,
    /// When set, the check applies only from this phase onward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_from: Option<ProjectPhase>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCheck {
    id: String,
    gap: String,
    metric: RecordMetric,
    #[serde(default)]
    at_least: Option<u64>,
    #[serde(default)]
    at_most: Option<u64>,
    #[serde(default)]
    applies_from: Option<ProjectPhase>,
}

impl TryFrom<RawCheck> for CompletenessCheck {
    type Error = ConfigError;

    fn try_from(raw: RawCheck) -> Result<Self, Self::Error> {
        let threshold = match (raw.at_least, raw.at_most) {
            (Some(n), None) => Threshold::AtLeast(n),
            (None, Some(n)) => Threshold::AtMost(n),
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidCheck {
                    id: raw.id,
                    reason: "at_least and at_most are mutually exclusive".to_string(),
                })
            }
            (None, None) => {
                return Err(ConfigError::InvalidCheck {
                    id: raw.id,
                    reason: "one of at_least or at_most is required".to_string(),
                })
            }
        };
        Ok(Self {
            id: raw.id,
            gap: raw.gap,
            metric: raw.metric,
            threshold,
            applies_from: raw.applies_from,
        })
    }
}

impl CompletenessCheck {
    fn new(
        id: &str,
        gap: &str,
        metric: RecordMetric,
        threshold: Threshold,
        applies_from: Option<ProjectPhase>,
    ) -> Self {
        Self {
            id: id.to_string(),
            gap: gap.to_string(),
            metric,
            threshold,
            applies_from,
        }
    }

    /// Whether the check applies in `phase`.
    pub fn applies_in(&self, phase: ProjectPhase) -> bool {
        self.applies_from.map_or(true, |from| phase.is_at_least(from))
    }

    /// Evaluate against counts.
    pub fn is_satisfied(&self, counts: &RecordCounts) -> bool {
        self.threshold.is_met(counts.get(self.metric))
    }
}

/// Validated, ordered list of completeness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CheckSet {
    checks: Vec<CompletenessCheck>,
}

impl CheckSet {
    /// Validate a list of checks.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicateCheck`] if two checks share an id.
    /// - [`ConfigError::InvalidCheck`] for a blank id or gap text.
    pub fn new(checks: Vec<CompletenessCheck>) -> Result<Self, ConfigError> {
        for (i, check) in checks.iter().enumerate() {
            if check.id.trim().is_empty() {
                return Err(ConfigError::InvalidCheck {
                    id: check.id.clone(),
                    reason: "id must not be empty".to_string(),
                });
            }
            if check.gap.trim().is_empty() {
                return Err(ConfigError::InvalidCheck {
                    id: check.id.clone(),
                    reason: "gap text must not be empty".to_string(),
                });
            }
            if checks[..i].iter().any(|c| c.id == check.id) {
                return Err(ConfigError::DuplicateCheck(check.id.clone()));
            }
        }
        Ok(Self { checks })
    }

    /// The reference check set: four base checks, then the phase-gated ones.
    pub fn standard() -> Self {
        use ProjectPhase::{Construction, MeasurementVerification};
        use RecordMetric::*;
        Self {
            checks: vec![
                CompletenessCheck::new("has_assets", "No assets captured", Assets, Threshold::AtLeast(1), None),
                CompletenessCheck::new("has_buildings", "No buildings assigned", Buildings, Threshold::AtLeast(1), None),
                CompletenessCheck::new("has_ecms", "No ECMs defined", Ecms, Threshold::AtLeast(1), None),
                CompletenessCheck::new(
                    "utility_bills_12_months",
                    "Fewer than 12 months of utility bills",
                    UtilityBillMonths,
                    Threshold::AtLeast(12),
                    None,
                ),
                CompletenessCheck::new(
                    "has_submittals",
                    "No submittals logged",
                    Submittals,
                    Threshold::AtLeast(1),
                    Some(Construction),
                ),
                CompletenessCheck::new(
                    "inspection_findings_resolved",
                    "Open inspection findings",
                    OpenInspectionFindings,
                    Threshold::AtMost(0),
                    Some(Construction),
                ),
                CompletenessCheck::new(
                    "has_mv_baseline",
                    "No M&V baseline data",
                    MvBaselinePoints,
                    Threshold::AtLeast(1),
                    Some(MeasurementVerification),
                ),
            ],
        }
    }

    /// All checks, in configuration order.
    pub fn checks(&self) -> &[CompletenessCheck] {
        &self.checks
    }

    /// The checks that apply in `phase`, in configuration order.
    pub fn applicable(&self, phase: ProjectPhase) -> impl Iterator<Item = &CompletenessCheck> {
        self.checks.iter().filter(move |c| c.applies_in(phase))
    }

    /// Score a project.
    pub fn score(&self, phase: ProjectPhase, counts: &RecordCounts) -> CompletenessReport {
        let results: Vec<CheckResult> = self
            .applicable(phase)
            .map(|c| CheckResult {
                id: c.id.clone(),
                metric: c.metric,
                value: counts.get(c.metric),
                satisfied: c.is_satisfied(counts),
                gap: c.gap.clone(),
            })
            .collect();
        let total = results.len();
        let satisfied = results.iter().filter(|r| r.satisfied).count();
        let gaps = results
            .iter()
            .filter(|r| !r.satisfied)
            .map(|r| r.gap.clone())
            .collect();
        CompletenessReport {
            phase,
            score: percentage(satisfied, total),
            satisfied,
            total,
            gaps,
            results,
        }
    }
}

impl Default for CheckSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'de> Deserialize<'de> for CheckSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let checks = Vec::<CompletenessCheck>::deserialize(deserializer)?;
        Self::new(checks).map_err(serde::de::Error::custom)
    }
}

/// `round(100 * satisfied / total)`, half-up, in integer arithmetic.
/// An empty check set scores 100.
fn percentage(satisfied: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let (s, t) = (satisfied as u64, total as u64);
    ((200 * s + t) / (2 * t)) as u8
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check id.
    pub id: String,
    /// Metric tested.
    pub metric: RecordMetric,
    /// Observed metric value.
    pub value: u64,
    /// Whether the check passed.
    pub satisfied: bool,
    /// Gap text (reported only when unsatisfied).
    pub gap: String,
}

/// Completeness of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessReport {
    /// Phase the checks were selected for.
    pub phase: ProjectPhase,
    /// Percentage score, 0..=100.
    pub score: u8,
    /// Number of satisfied checks.
    pub satisfied: usize,
    /// Number of applicable checks.
    pub total: usize,
    /// Gap texts for unsatisfied checks, in evaluation order.
    pub gaps: Vec<String>,
    /// Per-check detail, in evaluation order.
    pub results: Vec<CheckResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn audit_counts() -> RecordCounts {
        RecordCounts::new()
            .with(RecordMetric::UtilityBillMonths, 12)
            .with(RecordMetric::Ecms, 1)
    }

    #[test]
    fn audit_phase_missing_assets_and_buildings() {
        let report = CheckSet::standard().score(ProjectPhase::Audit, &audit_counts());
        assert_eq!(report.total, 4);
        assert_eq!(report.satisfied, 2);
        assert_eq!(report.score, 50);
        assert_eq!(report.gaps, vec!["No assets captured", "No buildings assigned"]);
    }

    #[test]
    fn phase_gating() {
        let set = CheckSet::standard();
        assert_eq!(set.applicable(ProjectPhase::Audit).count(), 4);
        assert_eq!(set.applicable(ProjectPhase::Development).count(), 4);
        assert_eq!(set.applicable(ProjectPhase::Construction).count(), 6);
        assert_eq!(set.applicable(ProjectPhase::MeasurementVerification).count(), 7);
        assert_eq!(set.applicable(ProjectPhase::Closeout).count(), 7);
    }

    #[test]
    fn construction_with_open_findings() {
        let counts = RecordCounts::new()
            .with(RecordMetric::Assets, 40)
            .with(RecordMetric::Buildings, 3)
            .with(RecordMetric::Ecms, 6)
            .with(RecordMetric::UtilityBillMonths, 24)
            .with(RecordMetric::Submittals, 2)
            .with(RecordMetric::OpenInspectionFindings, 1);
        let report = CheckSet::standard().score(ProjectPhase::Construction, &counts);
        assert_eq!(report.score, 83);
        assert_eq!(report.gaps, vec!["Open inspection findings"]);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(0, 7), 0);
        assert_eq!(percentage(7, 7), 100);
        assert_eq!(percentage(0, 0), 100);
    }

    #[test]
    fn duplicate_check_ids_rejected() {
        let mut checks = CheckSet::standard().checks().to_vec();
        checks.push(checks[0].clone());
        assert_eq!(
            CheckSet::new(checks).unwrap_err(),
            ConfigError::DuplicateCheck("has_assets".into())
        );
    }

    #[test]
    fn check_yaml_shape() {
        let yaml = "- id: has_assets\n  gap: No assets captured\n  metric: assets\n  at_least: 1\n- id: findings\n  gap: Open findings\n  metric: open_inspection_findings\n  at_most: 0\n  applies_from: construction\n";
        let set: CheckSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(set.checks()[0].threshold, Threshold::AtLeast(1));
        assert_eq!(set.checks()[1].threshold, Threshold::AtMost(0));
        assert_eq!(set.checks()[1].applies_from, Some(ProjectPhase::Construction));
    }

    #[test]
    fn check_with_both_bounds_rejected() {
        let yaml = "- id: has_assets\n  gap: No assets captured\n  metric: assets\n  at_least: 1\n  at_most: 0\n";
        let err = serde_yaml::from_str::<CheckSet>(yaml).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"), "{err}");
    }

    #[test]
    fn check_without_bound_or_with_unknown_key_rejected() {
        let missing = "- { id: has_assets, gap: No assets captured, metric: assets }\n";
        let err = serde_yaml::from_str::<CheckSet>(missing).unwrap_err();
        assert!(err.to_string().contains("at_least or at_most"), "{err}");

        let typo = "- { id: has_assets, gap: No assets captured, metric: assets, at_leat: 1 }\n";
        assert!(serde_yaml::from_str::<CheckSet>(typo).is_err());
    }

    fn any_phase() -> impl Strategy<Value = ProjectPhase> {
        prop::sample::select(ProjectPhase::ALL.to_vec())
    }

    proptest! {
        /// Same input, same report.
        #[test]
        fn scoring_is_deterministic(
            phase in any_phase(),
            values in prop::collection::vec(0u64..30, RecordMetric::ALL.len()),
        ) {
            let mut counts = RecordCounts::new();
            for (m, v) in RecordMetric::ALL.into_iter().zip(values) {
                counts.set(m, v);
            }
            let set = CheckSet::standard();
            let a = set.score(phase, &counts);
            let b = set.score(phase, &counts);
            prop_assert!(a.score <= 100);
            prop_assert_eq!(a.gaps.len(), a.total - a.satisfied);
            prop_assert_eq!(a, b);
        }
    }
}
