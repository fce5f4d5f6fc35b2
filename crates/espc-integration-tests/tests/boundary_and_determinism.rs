//! # Boundary and Determinism Properties
//!
//! Property tests over the engine: the justification minimum is a pure
//! function of the trimmed character count, a rejected edit leaves no trace,
//! replaying a committed edit is a no-op, and both projections are
//! deterministic in their inputs.

use proptest::prelude::*;
use serde_json::{json, Value};

use espc_core::{Actor, ActorId, EntityRef, ManualClock, ProjectId, ProjectPhase, Role, Timestamp};
use espc_governance::{
    EditOutcome, GovernanceConfig, GovernanceEngine, GovernanceStore, InMemoryStore, Record,
    RecordCounts, RecordMetric, RejectionCause,
};

type Engine = GovernanceEngine<InMemoryStore, ManualClock>;

fn building() -> EntityRef {
    EntityRef::parse("building", "B-12").unwrap()
}

fn owner() -> Actor {
    Actor::new(ActorId::new("eng-1").unwrap(), "Sam Engineer", Role::Engineer)
}

fn engine() -> Engine {
    let store = InMemoryStore::new();
    store
        .insert_record(
            Record::new(building(), ProjectId::new("espc-001").unwrap())
                .with_owner(ActorId::new("eng-1").unwrap())
                .with_field("name", json!("Library")),
        )
        .unwrap();
    let clock = ManualClock::new(Timestamp::parse("2026-06-01T00:00:00Z").unwrap());
    GovernanceEngine::new(store, GovernanceConfig::standard(), clock).unwrap()
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,24}".prop_map(Value::String),
    ]
}

proptest! {
    /// Whether an edit commits depends only on the trimmed character count
    /// of the reason.
    #[test]
    fn justification_boundary(
        pad_left in " {0,3}",
        body in "[a-zé ]{0,16}",
        pad_right in " {0,3}",
    ) {
        let engine = engine();
        let reason = format!("{pad_left}{body}{pad_right}");
        let trimmed = reason.trim().chars().count();
        let outcome = engine
            .edit(&owner(), &building(), "name", json!("Main Library"), &reason)
            .unwrap();
        if trimmed >= 10 {
            let is_committed = matches!(outcome, EditOutcome::Committed { .. });
            prop_assert!(is_committed);
        } else {
            prop_assert_eq!(
                outcome,
                EditOutcome::Rejected {
                    cause: RejectionCause::ReasonTooShort { min: 10, actual: trimmed }
                }
            );
            prop_assert!(engine.audit_log(&building()).is_empty());
            prop_assert_eq!(engine.store().read_field(&building(), "name").unwrap(), json!("Library"));
        }
    }

    /// Committing the same value twice yields exactly one audit entry.
    #[test]
    fn repeated_edit_is_idempotent(value in scalar()) {
        let engine = engine();
        let first = engine
            .edit(&owner(), &building(), "use_type", value.clone(), "survey result entered")
            .unwrap();
        let second = engine
            .edit(&owner(), &building(), "use_type", value.clone(), "survey result entered")
            .unwrap();
        prop_assert_eq!(second, EditOutcome::NoChange);
        let expected = usize::from(matches!(first, EditOutcome::Committed { .. }));
        prop_assert_eq!(engine.field_history(&building(), "use_type").len(), expected);
        prop_assert_eq!(engine.store().read_field(&building(), "use_type").unwrap(), value);
    }

    /// Completeness scores are bounded and deterministic for any counts.
    #[test]
    fn completeness_is_bounded_and_deterministic(
        values in prop::collection::vec(0u64..20, RecordMetric::ALL.len()),
        phase_index in 0usize..ProjectPhase::ALL.len(),
    ) {
        let phase = ProjectPhase::ALL[phase_index];
        let mut counts = RecordCounts::new();
        for (metric, value) in RecordMetric::ALL.into_iter().zip(values) {
            counts.set(metric, value);
        }
        let checks = GovernanceConfig::standard().completeness;
        let a = checks.score(phase, &counts);
        let b = checks.score(phase, &counts);
        prop_assert!(a.score <= 100);
        prop_assert_eq!(a.total - a.satisfied, a.gaps.len());
        prop_assert_eq!(a, b);
    }
}
