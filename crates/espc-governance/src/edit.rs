//! # Edit Transaction State Machine
//!
//! An edit of one field of one record is an explicit value moving through:
//!
//! ```text
//! Viewing ──begin──▶ Proposing ──evaluate──▶ Justifying ──justify──▶ (commit) ──▶ Committed
//!                        │                        │                      │
//!                        ▼                        ▼                      ▼
//!                    Rejected(NoChange |      Rejected(ReasonTooShort) Rejected(any cause,
//!                     PermissionDenied |         │                      re-validated under
//!                     LockViolation |            └──reprompt──▶ Justifying   the store lock)
//!                     InvalidValue)
//! ```
//!
//! Transitions are pure: nothing here touches the store. The engine feeds
//! the transaction the data it needs and performs the commit. Until a commit
//! lands, `cancel` returns to `Viewing` with no residual state.
//!
//! Rejections are values ([`RejectionCause`]), not errors. Calling a
//! transition from a state that does not allow it is a programming error and
//! returns [`GovernanceError::InvalidTransition`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use espc_core::{Actor, DataModule, EntityRef, ProjectPhase, Role};

use crate::audit::AuditEntry;
use crate::error::GovernanceError;
use crate::lock::{lock_reason, LockPolicy, LockRecord, LockType};
use crate::permission::Standing;

/// Why an edit or lock operation did not take effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum RejectionCause {
    /// The candidate equals the current value. Success with no effect.
    NoChange,
    /// The actor's role and ownership do not permit the operation.
    PermissionDenied {
        /// Effective role in the record's project.
        role: Role,
        /// Whether the actor owns the record.
        is_owner: bool,
    },
    /// A lock the actor cannot override covers the field.
    LockViolation {
        /// The governing lock.
        lock: LockRecord,
        /// Rendered lock explanation.
        message: String,
    },
    /// The candidate is not an acceptable value for the field.
    InvalidValue {
        /// The field.
        field: String,
        /// What is wrong with the candidate.
        message: String,
    },
    /// The trimmed justification is below the configured minimum.
    ReasonTooShort {
        /// Required character count.
        min: usize,
        /// Supplied character count after trimming.
        actual: usize,
    },
    /// The lock type cannot be placed or released through the engine.
    UnsupportedLockType {
        /// The offending lock type.
        lock_type: LockType,
    },
}

impl RejectionCause {
    /// Whether this outcome is benign (not surfaced to the user as an error).
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NoChange)
    }

    /// Return the string identifier of this cause.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoChange => "no_change",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::LockViolation { .. } => "lock_violation",
            Self::InvalidValue { .. } => "invalid_value",
            Self::ReasonTooShort { .. } => "reason_too_short",
            Self::UnsupportedLockType { .. } => "unsupported_lock_type",
        }
    }
}

impl std::fmt::Display for RejectionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoChange => f.write_str("value unchanged"),
            Self::PermissionDenied { role, is_owner } => {
                write!(f, "permission denied for {role} (owner: {is_owner})")
            }
            Self::LockViolation { message, .. } => write!(f, "locked: {message}"),
            Self::InvalidValue { field, message } => write!(f, "invalid {field}: {message}"),
            Self::ReasonTooShort { min, actual } => write!(
                f,
                "justification must be at least {min} characters (got {actual})"
            ),
            Self::UnsupportedLockType { lock_type } => {
                write!(f, "{lock_type} locks cannot be changed through governance")
            }
        }
    }
}

/// A constraint on the values a field may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    /// A string naming a [`ProjectPhase`].
    ProjectPhase,
}

impl ValueRule {
    /// Check a candidate against the rule.
    pub fn check(&self, field: &str, candidate: &Value) -> Result<(), RejectionCause> {
        let invalid = |message: String| RejectionCause::InvalidValue {
            field: field.to_string(),
            message,
        };
        match self {
            Self::ProjectPhase => match candidate {
                Value::String(s) => s
                    .parse::<ProjectPhase>()
                    .map(drop)
                    .map_err(|e| invalid(e.to_string())),
                other => Err(invalid(format!("expected a phase name, got {other}"))),
            },
        }
    }
}

/// Everything a proposal is validated against.
#[derive(Debug, Clone, Copy)]
pub struct EditContext<'a> {
    /// Actor's standing on the record.
    pub standing: Standing,
    /// Lock precedence table.
    pub policy: &'a LockPolicy,
    /// Active locks on the record.
    pub locks: &'a [LockRecord],
    /// Current value of the field.
    pub current: &'a Value,
    /// Constraint on the field's values, if any.
    pub rule: Option<ValueRule>,
}

/// Validate a candidate value: no-change first, then permission, then locks,
/// then the field's value rule.
///
/// Pure. The engine calls it when the proposal is made and again under the
/// store's write lock at commit; with the same inputs both agree.
pub fn validate_edit(
    ctx: &EditContext<'_>,
    field: &str,
    candidate: &Value,
) -> Result<(), RejectionCause> {
    if ctx.current == candidate {
        return Err(RejectionCause::NoChange);
    }
    if !ctx.standing.can_edit() {
        return Err(RejectionCause::PermissionDenied {
            role: ctx.standing.role,
            is_owner: ctx.standing.is_owner,
        });
    }
    if let Some(lock) = ctx.policy.blocking_lock(ctx.locks, field, ctx.standing.role) {
        return Err(RejectionCause::LockViolation {
            message: lock_reason(lock),
            lock: lock.clone(),
        });
    }
    if let Some(rule) = ctx.rule {
        rule.check(field, candidate)?;
    }
    Ok(())
}

/// Check a justification against the minimum trimmed character count,
/// returning the trimmed text.
pub fn check_justification(reason: &str, min_chars: usize) -> Result<String, RejectionCause> {
    let trimmed = reason.trim();
    let actual = trimmed.chars().count();
    if actual < min_chars {
        return Err(RejectionCause::ReasonTooShort {
            min: min_chars,
            actual,
        });
    }
    Ok(trimmed.to_string())
}

/// State of an edit transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EditState {
    /// Showing the current value; no edit in progress.
    Viewing,
    /// A candidate value awaits validation.
    Proposing {
        /// Proposed value.
        candidate: Value,
    },
    /// The candidate passed validation and awaits a justification.
    Justifying {
        /// Proposed value.
        candidate: Value,
    },
    /// The edit landed.
    Committed {
        /// The audit entry recording it.
        entry: AuditEntry,
    },
    /// The edit did not take effect.
    Rejected {
        /// Why.
        cause: RejectionCause,
        /// The candidate that was rejected.
        candidate: Value,
    },
}

impl EditState {
    /// Return the string identifier of this state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Viewing => "viewing",
            Self::Proposing { .. } => "proposing",
            Self::Justifying { .. } => "justifying",
            Self::Committed { .. } => "committed",
            Self::Rejected { .. } => "rejected",
        }
    }
}

impl std::fmt::Display for EditState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A justified candidate ready for the engine to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Justified {
    /// Proposed value.
    pub candidate: Value,
    /// Trimmed justification.
    pub reason: String,
}

/// Final result of an edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditOutcome {
    /// The edit landed.
    Committed {
        /// The audit entry recording it.
        entry: AuditEntry,
    },
    /// The candidate equalled the current value. Nothing was written.
    NoChange,
    /// The edit was refused.
    Rejected {
        /// Why.
        cause: RejectionCause,
    },
}

impl EditOutcome {
    /// Whether the edit succeeded, including the no-change case.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Committed { .. } | Self::NoChange)
    }
}

/// One in-flight edit of one field.
#[derive(Debug, Clone)]
pub struct EditTransaction {
    actor: Actor,
    entity: EntityRef,
    field: String,
    module: DataModule,
    original: Value,
    state: EditState,
}

impl EditTransaction {
    /// Open a transaction in `Viewing`.
    pub fn new(
        actor: Actor,
        entity: EntityRef,
        field: impl Into<String>,
        module: DataModule,
        original: Value,
    ) -> Self {
        Self {
            actor,
            entity,
            field: field.into(),
            module,
            original,
            state: EditState::Viewing,
        }
    }

    /// The acting user.
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// The record being edited.
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// The field being edited.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The module that owns the field.
    pub fn module(&self) -> DataModule {
        self.module
    }

    /// The value observed when the transaction opened.
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// Current state.
    pub fn state(&self) -> &EditState {
        &self.state
    }

    fn invalid(&self, attempted: &'static str) -> GovernanceError {
        GovernanceError::InvalidTransition {
            state: self.state.name(),
            attempted,
        }
    }

    fn transition(&mut self, next: EditState) {
        tracing::debug!(
            entity = %self.entity,
            field = %self.field,
            from = self.state.name(),
            to = next.name(),
            "edit transition"
        );
        self.state = next;
    }

    /// `Viewing → Proposing`.
    pub fn begin(&mut self, candidate: Value) -> Result<&EditState, GovernanceError> {
        if self.state != EditState::Viewing {
            return Err(self.invalid("propose"));
        }
        self.transition(EditState::Proposing { candidate });
        Ok(&self.state)
    }

    /// `Proposing → Justifying | Rejected`.
    pub fn evaluate(&mut self, ctx: &EditContext<'_>) -> Result<&EditState, GovernanceError> {
        let EditState::Proposing { candidate } = &self.state else {
            return Err(self.invalid("evaluate"));
        };
        let candidate = candidate.clone();
        let next = match validate_edit(ctx, &self.field, &candidate) {
            Ok(()) => EditState::Justifying { candidate },
            Err(cause) => EditState::Rejected { cause, candidate },
        };
        self.transition(next);
        Ok(&self.state)
    }

    /// Check a justification while `Justifying`.
    ///
    /// A too-short reason moves to `Rejected(ReasonTooShort)` and returns
    /// `None`. An acceptable one leaves the state at `Justifying` and returns
    /// the candidate for the engine to commit; the result is applied with
    /// [`settle`](Self::settle).
    pub fn justify(
        &mut self,
        reason: &str,
        min_chars: usize,
    ) -> Result<Option<Justified>, GovernanceError> {
        let EditState::Justifying { candidate } = &self.state else {
            return Err(self.invalid("justify"));
        };
        let candidate = candidate.clone();
        match check_justification(reason, min_chars) {
            Ok(reason) => Ok(Some(Justified { candidate, reason })),
            Err(cause) => {
                self.transition(EditState::Rejected { cause, candidate });
                Ok(None)
            }
        }
    }

    /// Apply the commit result: `Justifying → Committed | Rejected`.
    pub fn settle(
        &mut self,
        result: Result<AuditEntry, RejectionCause>,
    ) -> Result<&EditState, GovernanceError> {
        let EditState::Justifying { candidate } = &self.state else {
            return Err(self.invalid("commit"));
        };
        let next = match result {
            Ok(entry) => EditState::Committed { entry },
            Err(cause) => EditState::Rejected {
                cause,
                candidate: candidate.clone(),
            },
        };
        self.transition(next);
        Ok(&self.state)
    }

    /// `Rejected(ReasonTooShort) → Justifying`, keeping the candidate.
    pub fn reprompt(&mut self) -> Result<&EditState, GovernanceError> {
        match &self.state {
            EditState::Rejected {
                cause: RejectionCause::ReasonTooShort { .. },
                candidate,
            } => {
                let candidate = candidate.clone();
                self.transition(EditState::Justifying { candidate });
                Ok(&self.state)
            }
            _ => Err(self.invalid("reprompt")),
        }
    }

    /// Return to `Viewing` from any state before commit.
    pub fn cancel(&mut self) -> Result<(), GovernanceError> {
        if matches!(self.state, EditState::Committed { .. }) {
            return Err(self.invalid("cancel"));
        }
        self.transition(EditState::Viewing);
        Ok(())
    }

    /// The final outcome, once the transaction has committed or been
    /// rejected.
    pub fn outcome(&self) -> Option<EditOutcome> {
        match &self.state {
            EditState::Committed { entry } => Some(EditOutcome::Committed {
                entry: entry.clone(),
            }),
            EditState::Rejected {
                cause: RejectionCause::NoChange,
                ..
            } => Some(EditOutcome::NoChange),
            EditState::Rejected { cause, .. } => Some(EditOutcome::Rejected {
                cause: cause.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockId;
    use espc_core::{ActorId, Timestamp};
    use proptest::prelude::*;
    use serde_json::json;

    fn actor(role: Role) -> Actor {
        Actor::new(ActorId::new("u-1").unwrap(), "Pat", role)
    }

    fn tx(role: Role) -> EditTransaction {
        EditTransaction::new(
            actor(role),
            EntityRef::parse("asset", "AHU-1").unwrap(),
            "make",
            DataModule::Assets,
            json!("Trane"),
        )
    }

    fn standing(role: Role, is_owner: bool) -> Standing {
        Standing { role, is_owner }
    }

    fn lock(lock_type: LockType) -> LockRecord {
        LockRecord {
            id: LockId::new(),
            entity: EntityRef::parse("asset", "AHU-1").unwrap(),
            field: None,
            lock_type,
            locked_by: "Avery".into(),
            locked_at: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
            reason: "Closed out".into(),
        }
    }

    #[test]
    fn happy_path_reaches_justifying() {
        let policy = LockPolicy::standard();
        let current = json!("Trane");
        let ctx = EditContext {
            standing: standing(Role::ProjectLead, false),
            policy: &policy,
            locks: &[],
            current: &current,
            rule: None,
        };
        let mut t = tx(Role::ProjectLead);
        t.begin(json!("Carrier")).unwrap();
        assert_eq!(
            t.evaluate(&ctx).unwrap(),
            &EditState::Justifying { candidate: json!("Carrier") }
        );
        let justified = t.justify("  fixed typo  ", 10).unwrap().unwrap();
        assert_eq!(justified.reason, "fixed typo");
        assert_eq!(t.state().name(), "justifying");
    }

    #[test]
    fn no_change_wins_over_locks_and_permissions() {
        let policy = LockPolicy::standard();
        let locks = [lock(LockType::Immutable)];
        let current = json!("Trane");
        let ctx = EditContext {
            standing: standing(Role::Engineer, false),
            policy: &policy,
            locks: &locks,
            current: &current,
            rule: None,
        };
        assert_eq!(validate_edit(&ctx, "make", &json!("Trane")), Err(RejectionCause::NoChange));
    }

    #[test]
    fn no_change_is_structural() {
        let policy = LockPolicy::standard();
        let current = json!(5);
        let ctx = EditContext {
            standing: standing(Role::Admin, false),
            policy: &policy,
            locks: &[],
            current: &current,
            rule: None,
        };
        assert!(validate_edit(&ctx, "x", &json!("5")).is_ok());
        assert_eq!(validate_edit(&ctx, "x", &json!(5)), Err(RejectionCause::NoChange));
    }

    #[test]
    fn immutable_blocks_admin() {
        let policy = LockPolicy::standard();
        let locks = [lock(LockType::Immutable)];
        let current = json!("Trane");
        let ctx = EditContext {
            standing: standing(Role::Admin, true),
            policy: &policy,
            locks: &locks,
            current: &current,
            rule: None,
        };
        let err = validate_edit(&ctx, "make", &json!("Carrier")).unwrap_err();
        assert!(matches!(err, RejectionCause::LockViolation { ref lock, .. } if lock.lock_type == LockType::Immutable));
    }

    #[test]
    fn engineer_non_owner_denied() {
        let policy = LockPolicy::standard();
        let current = json!("Trane");
        let ctx = EditContext {
            standing: standing(Role::Engineer, false),
            policy: &policy,
            locks: &[],
            current: &current,
            rule: None,
        };
        assert_eq!(
            validate_edit(&ctx, "make", &json!("Carrier")),
            Err(RejectionCause::PermissionDenied { role: Role::Engineer, is_owner: false })
        );
    }

    #[test]
    fn phase_rule_rejects_unknown_phases_after_permission_and_locks() {
        let policy = LockPolicy::standard();
        let current = json!("audit");
        let ctx = EditContext {
            standing: standing(Role::Admin, false),
            policy: &policy,
            locks: &[],
            current: &current,
            rule: Some(ValueRule::ProjectPhase),
        };
        assert!(validate_edit(&ctx, "phase", &json!("Construction")).is_ok());
        assert!(validate_edit(&ctx, "phase", &json!("M&V")).is_ok());
        let err = validate_edit(&ctx, "phase", &json!("warranty")).unwrap_err();
        assert!(matches!(err, RejectionCause::InvalidValue { ref field, .. } if field == "phase"));
        assert_eq!(err.as_str(), "invalid_value");
        assert!(matches!(
            validate_edit(&ctx, "phase", &json!(3)),
            Err(RejectionCause::InvalidValue { .. })
        ));

        let denied = EditContext {
            standing: standing(Role::Engineer, false),
            ..ctx
        };
        assert!(matches!(
            validate_edit(&denied, "phase", &json!("warranty")),
            Err(RejectionCause::PermissionDenied { .. })
        ));
    }

    #[test]
    fn justification_boundary() {
        assert!(check_justification("fixed typo", 10).is_ok());
        assert_eq!(
            check_justification("fixed it", 10),
            Err(RejectionCause::ReasonTooShort { min: 10, actual: 8 })
        );
        assert_eq!(
            check_justification("   fixed it     ", 10),
            Err(RejectionCause::ReasonTooShort { min: 10, actual: 8 })
        );
    }

    #[test]
    fn short_reason_can_be_reprompted() {
        let mut t = tx(Role::Admin);
        t.begin(json!("Carrier")).unwrap();
        let policy = LockPolicy::standard();
        let current = json!("Trane");
        t.evaluate(&EditContext {
            standing: standing(Role::Admin, false),
            policy: &policy,
            locks: &[],
            current: &current,
            rule: None,
        })
        .unwrap();
        assert!(t.justify("fixed it", 10).unwrap().is_none());
        assert_eq!(
            t.outcome(),
            Some(EditOutcome::Rejected {
                cause: RejectionCause::ReasonTooShort { min: 10, actual: 8 }
            })
        );
        t.reprompt().unwrap();
        assert!(t.justify("fixed typo", 10).unwrap().is_some());
    }

    #[test]
    fn wrong_state_calls_are_errors() {
        let mut t = tx(Role::Admin);
        assert!(matches!(
            t.justify("fixed typo", 10),
            Err(GovernanceError::InvalidTransition { state: "viewing", attempted: "justify" })
        ));
        assert!(t.reprompt().is_err());
        t.begin(json!(1)).unwrap();
        assert!(t.begin(json!(2)).is_err());
    }

    #[test]
    fn cancel_returns_to_viewing_with_original_intact() {
        let mut t = tx(Role::Admin);
        t.begin(json!("Carrier")).unwrap();
        t.cancel().unwrap();
        assert_eq!(t.state(), &EditState::Viewing);
        assert_eq!(t.original(), &json!("Trane"));
        assert!(t.outcome().is_none());
    }

    proptest! {
        /// Trimmed length below the minimum is always rejected; at or above, accepted.
        #[test]
        fn justification_threshold(body in "[a-z ]{0,30}", pad in " {0,5}", min in 1usize..20) {
            let reason = format!("{pad}{body}{pad}");
            let len = reason.trim().chars().count();
            prop_assert_eq!(check_justification(&reason, min).is_ok(), len >= min);
        }
    }
}
