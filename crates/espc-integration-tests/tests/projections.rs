//! # Freshness and Completeness Projections
//!
//! Both are recomputed from committed store state on every call. Freshness
//! follows module timestamps advanced by commits; completeness tallies the
//! project's records and reads the phase from the project record.

use serde_json::json;

use espc_core::{Actor, ActorId, DataModule, EntityRef, ManualClock, ProjectId, ProjectPhase, Role, Timestamp};
use espc_governance::{
    EditOutcome, FreshnessStatus, GovernanceConfig, GovernanceEngine, GovernanceError, GovernanceStore,
    InMemoryStore, Record, RecordMetric, RejectionCause,
};

type Engine = GovernanceEngine<InMemoryStore, ManualClock>;

fn project() -> ProjectId {
    ProjectId::new("espc-001").unwrap()
}

fn record(entity_type: &str, id: &str) -> Record {
    Record::new(EntityRef::parse(entity_type, id).unwrap(), project())
}

fn admin() -> Actor {
    Actor::new(ActorId::new("admin-1").unwrap(), "Avery Admin", Role::Admin)
}

fn audit_phase_project() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .insert_record(record("project", "espc-001").with_field("phase", json!("audit")))
        .unwrap();
    store
        .insert_record(record("ecm", "ECM-1").with_field("name", json!("LED retrofit")))
        .unwrap();
    for month in 1..=12 {
        store
            .insert_record(
                record("utility_bill", &format!("UB-{month:02}"))
                    .with_field("period", json!(format!("2025-{month:02}"))),
            )
            .unwrap();
    }
    store
}

fn engine(store: InMemoryStore, at: &str) -> (Engine, ManualClock) {
    let clock = ManualClock::new(Timestamp::parse(at).unwrap());
    let engine = GovernanceEngine::new(store, GovernanceConfig::standard(), clock.clone()).unwrap();
    (engine, clock)
}

#[test]
fn audit_phase_gaps_are_assets_then_buildings() {
    let (engine, _) = engine(audit_phase_project(), "2026-01-15T00:00:00Z");
    let report = engine.completeness(&project()).unwrap();
    assert_eq!(report.phase, ProjectPhase::Audit);
    assert_eq!(report.total, 4);
    assert_eq!(report.satisfied, 2);
    assert_eq!(report.score, 50);
    assert_eq!(report.gaps, vec!["No assets captured", "No buildings assigned"]);
}

#[test]
fn completeness_is_identical_on_repeated_calls() {
    let (engine, _) = engine(audit_phase_project(), "2026-01-15T00:00:00Z");
    let a = engine.completeness(&project()).unwrap();
    let b = engine.completeness(&project()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn bill_months_count_distinct_periods() {
    let store = audit_phase_project();
    store
        .insert_record(record("utility_bill", "UB-12-corrected").with_field("period", json!("2025-12")))
        .unwrap();
    store.insert_record(record("utility_bill", "UB-no-period")).unwrap();
    let (engine, _) = engine(store, "2026-01-15T00:00:00Z");
    assert_eq!(engine.record_counts(&project()).get(RecordMetric::UtilityBillMonths), 12);
}

#[test]
fn phase_change_is_a_governed_edit_that_adds_checks() {
    let store = audit_phase_project();
    store.insert_record(record("asset", "AHU-1")).unwrap();
    store.insert_record(record("building", "B-1")).unwrap();
    store
        .insert_record(record("inspection_finding", "F-1").with_field("status", json!("open")))
        .unwrap();
    store
        .insert_record(record("inspection_finding", "F-2").with_field("status", json!("resolved")))
        .unwrap();
    let (engine, _) = engine(store, "2026-01-15T00:00:00Z");
    assert_eq!(engine.completeness(&project()).unwrap().score, 100);

    let project_ref = EntityRef::parse("project", "espc-001").unwrap();
    engine
        .edit(&admin(), &project_ref, "phase", json!("construction"), "notice to proceed issued")
        .unwrap();
    let report = engine.completeness(&project()).unwrap();
    assert_eq!(report.phase, ProjectPhase::Construction);
    assert_eq!(report.total, 6);
    assert_eq!(report.gaps, vec!["No submittals logged", "Open inspection findings"]);
    assert_eq!(report.score, 67);
}

#[test]
fn phase_display_labels_are_read_and_accepted_as_edits() {
    let store = InMemoryStore::new();
    store
        .insert_record(record("project", "espc-001").with_field("phase", json!("Audit")))
        .unwrap();
    let (engine, _) = engine(store, "2026-01-15T00:00:00Z");
    assert_eq!(engine.project_phase(&project()).unwrap(), ProjectPhase::Audit);

    let project_ref = EntityRef::parse("project", "espc-001").unwrap();
    let outcome = engine
        .edit(&admin(), &project_ref, "phase", json!("M&V"), "construction acceptance signed")
        .unwrap();
    assert!(matches!(outcome, EditOutcome::Committed { .. }));
    let report = engine.completeness(&project()).unwrap();
    assert_eq!(report.phase, ProjectPhase::MeasurementVerification);
}

#[test]
fn unknown_phase_edit_is_rejected_and_completeness_survives() {
    let (engine, _) = engine(audit_phase_project(), "2026-01-15T00:00:00Z");
    let project_ref = EntityRef::parse("project", "espc-001").unwrap();

    for bad in [json!("warranty"), json!(4), json!(null)] {
        let outcome = engine
            .edit(&admin(), &project_ref, "phase", bad.clone(), "moving to the next stage")
            .unwrap();
        let EditOutcome::Rejected { cause } = outcome else {
            panic!("expected rejection for {bad}, got {outcome:?}");
        };
        assert!(matches!(cause, RejectionCause::InvalidValue { ref field, .. } if field == "phase"));
    }

    assert_eq!(engine.store().read_field(&project_ref, "phase").unwrap(), json!("audit"));
    assert!(engine.audit_log(&project_ref).is_empty());
    assert_eq!(engine.completeness(&project()).unwrap().score, 50);
}

#[test]
fn missing_phase_is_an_error() {
    let store = InMemoryStore::new();
    store.insert_record(record("project", "espc-001")).unwrap();
    let (engine, _) = engine(store, "2026-01-15T00:00:00Z");
    assert!(matches!(
        engine.completeness(&project()),
        Err(GovernanceError::MissingPhase(_))
    ));
}

#[test]
fn freshness_follows_commits_and_clock() {
    let store = audit_phase_project();
    store.insert_record(record("asset", "AHU-1")).unwrap();
    let (engine, clock) = engine(store, "2026-03-01T00:00:00Z");

    let asset = EntityRef::parse("asset", "AHU-1").unwrap();
    engine
        .edit(&admin(), &asset, "make", json!("Trane"), "nameplate photographed")
        .unwrap();

    let reading = |engine: &Engine| {
        engine
            .freshness_report(&project())
            .into_iter()
            .find(|r| r.module == DataModule::Assets)
            .unwrap()
    };

    clock.advance_days(10);
    let r = reading(&engine);
    assert_eq!(r.status, Some(FreshnessStatus::Fresh));
    assert_eq!(r.age.as_deref(), Some("1 week ago"));

    clock.advance_days(10);
    assert_eq!(reading(&engine).status, Some(FreshnessStatus::Amber));

    clock.advance_days(20);
    assert_eq!(reading(&engine).status, Some(FreshnessStatus::Red));

    engine
        .edit(&admin(), &asset, "make", json!("Carrier"), "replaced under ECM-1")
        .unwrap();
    let r = reading(&engine);
    assert_eq!(r.status, Some(FreshnessStatus::Fresh));
    assert_eq!(r.age.as_deref(), Some("today"));
}

#[test]
fn never_updated_modules_have_no_status() {
    let (engine, _) = engine(audit_phase_project(), "2026-01-15T00:00:00Z");
    let report = engine.freshness_report(&project());
    assert_eq!(report.len(), DataModule::ALL.len());
    assert!(report.iter().all(|r| r.status.is_none() && r.age.is_none()));
}

#[test]
fn freshness_is_per_project() {
    let store = audit_phase_project();
    let other = ProjectId::new("espc-002").unwrap();
    store
        .insert_record(Record::new(EntityRef::parse("asset", "X-1").unwrap(), other.clone()))
        .unwrap();
    let (engine, _) = engine(store, "2026-01-15T00:00:00Z");
    let asset = EntityRef::parse("asset", "X-1").unwrap();
    engine
        .edit(&admin(), &asset, "make", json!("York"), "nameplate photographed")
        .unwrap();
    assert!(engine.module_last_updated(&other, DataModule::Assets).is_some());
    assert!(engine.module_last_updated(&project(), DataModule::Assets).is_none());
}
