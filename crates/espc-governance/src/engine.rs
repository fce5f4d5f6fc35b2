//! # Governance Engine
//!
//! Orchestrates the edit transaction against an injected
//! [`GovernanceStore`] and exposes the read-only projections (audit queries,
//! freshness, completeness) that presentation surfaces consume.
//!
//! The engine owns no mutable state. It holds the store handle, the
//! validated configuration, the lock precedence table and a [`Clock`].
//!
//! ## Edit flow
//!
//! 1. [`view`](GovernanceEngine::view) opens an [`EditTransaction`] on a
//!    governed field.
//! 2. [`propose`](GovernanceEngine::propose) validates the candidate against
//!    current store state (no-change, permission, locks) and the field's
//!    value rule. The project record's `phase` must name a known phase.
//! 3. [`justify`](GovernanceEngine::justify) checks the reason and commits.
//!    The commit re-runs the same validation under the store's write lock,
//!    so a lock placed or a value written since step 2 is honoured.
//!
//! [`edit`](GovernanceEngine::edit) runs all three in one call.

use serde::Serialize;
use serde_json::{json, Value};

use espc_core::{Actor, Clock, DataModule, EntityRef, ProjectId, ProjectPhase, Timestamp};

use crate::audit::{display_order, AuditAction, AuditDraft, AuditEntry, AuditEntryId};
use crate::completeness::{CompletenessReport, RecordCounts};
use crate::config::GovernanceConfig;
use crate::edit::{
    check_justification, validate_edit, EditContext, EditOutcome, EditState, EditTransaction,
    RejectionCause, ValueRule,
};
use crate::error::GovernanceError;
use crate::freshness::FreshnessReading;
use crate::lock::{lock_reason, LockId, LockPolicy, LockRecord, LockType};
use crate::permission::{allowed_actions, can_approve, can_delete, can_unlock_baseline, Permission, Standing};
use crate::store::{GovernanceStore, PendingEdit};

/// Entity type of the record that carries a project's phase.
pub const PROJECT_ENTITY_TYPE: &str = "project";

/// Field of the project record holding its phase.
pub const PHASE_FIELD: &str = "phase";

/// What a presentation surface needs to render one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Affordance {
    /// The record.
    pub entity: EntityRef,
    /// The field.
    pub field: String,
    /// Module that owns the field.
    pub module: DataModule,
    /// Current value.
    pub value: Value,
    /// Whether role and ownership permit editing.
    pub can_edit: bool,
    /// Whether an edit could be proposed right now (permitted and unlocked).
    pub editable: bool,
    /// Every permission the actor holds on the record.
    pub allowed_actions: Vec<Permission>,
    /// The governing lock, when one blocks this actor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockRecord>,
    /// Lock tooltip text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_message: Option<String>,
}

/// Result of a lock placement or release.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LockOutcome {
    /// The lock is now active.
    Placed {
        /// The new lock.
        lock: LockRecord,
        /// Audit entry recording the placement.
        entry: AuditEntry,
    },
    /// The lock was removed.
    Released {
        /// The removed lock.
        lock: LockRecord,
        /// Audit entry recording the release.
        entry: AuditEntry,
    },
    /// Nothing changed.
    Rejected {
        /// Why.
        cause: RejectionCause,
    },
}

/// The data governance engine.
#[derive(Debug)]
pub struct GovernanceEngine<S, C> {
    store: S,
    config: GovernanceConfig,
    policy: LockPolicy,
    clock: C,
}

impl<S: GovernanceStore, C: Clock> GovernanceEngine<S, C> {
    /// Build an engine over `store`.
    ///
    /// # Errors
    ///
    /// [`GovernanceError::Config`] if the configuration fails validation.
    pub fn new(store: S, config: GovernanceConfig, clock: C) -> Result<Self, GovernanceError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            policy: LockPolicy::standard(),
            clock,
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// The lock precedence table.
    pub fn policy(&self) -> &LockPolicy {
        &self.policy
    }

    fn module_for(&self, entity: &EntityRef, field: &str) -> Result<DataModule, GovernanceError> {
        self.config
            .fields
            .module_for(&entity.entity_type, field)
            .ok_or_else(|| GovernanceError::FieldNotGoverned {
                entity_type: entity.entity_type.clone(),
                field: field.to_string(),
            })
    }

    // ── Edit transaction ────────────────────────────────────────────

    /// The value rule governing a field, if any.
    fn value_rule(entity: &EntityRef, field: &str) -> Option<ValueRule> {
        (entity.entity_type.as_str() == PROJECT_ENTITY_TYPE && field == PHASE_FIELD)
            .then_some(ValueRule::ProjectPhase)
    }

    /// Open an edit transaction on a governed field.
    pub fn view(
        &self,
        actor: &Actor,
        entity: &EntityRef,
        field: &str,
    ) -> Result<EditTransaction, GovernanceError> {
        let module = self.module_for(entity, field)?;
        let current = self.store.read_field(entity, field)?;
        Ok(EditTransaction::new(
            actor.clone(),
            entity.clone(),
            field,
            module,
            current,
        ))
    }

    /// Propose a candidate value: `Viewing → Justifying | Rejected`.
    pub fn propose<'t>(
        &self,
        tx: &'t mut EditTransaction,
        candidate: Value,
    ) -> Result<&'t EditState, GovernanceError> {
        let header = self.store.record_header(tx.entity())?;
        let current = self.store.read_field(tx.entity(), tx.field())?;
        let locks = self.store.locks_for(tx.entity());
        let ctx = EditContext {
            standing: Standing::of(tx.actor(), &header),
            policy: &self.policy,
            locks: &locks,
            current: &current,
            rule: Self::value_rule(tx.entity(), tx.field()),
        };
        tx.begin(candidate)?;
        tx.evaluate(&ctx)?;
        if let EditState::Rejected { cause, .. } = tx.state() {
            if cause.is_benign() {
                tracing::debug!(entity = %tx.entity(), field = tx.field(), "edit proposal unchanged");
            } else {
                tracing::warn!(entity = %tx.entity(), field = tx.field(), %cause, "edit proposal rejected");
            }
        }
        Ok(tx.state())
    }

    /// Supply the justification and commit: `Justifying → Committed | Rejected`.
    ///
    /// The commit re-validates no-change, permission and locks under the
    /// store's write lock. The audit entry records the value actually
    /// replaced.
    pub fn justify<'t>(
        &self,
        tx: &'t mut EditTransaction,
        reason: &str,
    ) -> Result<&'t EditState, GovernanceError> {
        let Some(justified) = tx.justify(reason, self.config.min_justification_chars)? else {
            if let EditState::Rejected { cause, .. } = tx.state() {
                tracing::warn!(entity = %tx.entity(), field = tx.field(), %cause, "edit rejected");
            }
            return Ok(tx.state());
        };

        let header = self.store.record_header(tx.entity())?;
        let actor = tx.actor().clone();
        let field = tx.field().to_string();
        let candidate = justified.candidate;
        let draft = AuditDraft {
            id: AuditEntryId::new(),
            action: AuditAction::FieldEdit,
            entity: tx.entity().clone(),
            project_id: header.project_id,
            field: field.clone(),
            old_value: tx.original().clone(),
            new_value: candidate.clone(),
            reason: justified.reason,
            user_name: actor.name.clone(),
            actor_id: actor.id.clone(),
        };
        let pending = PendingEdit {
            module: tx.module(),
            audit: draft,
        };
        let rule = Self::value_rule(tx.entity(), &field);

        let result = self.store.commit_edit(pending, &self.clock, |view| {
            validate_edit(
                &EditContext {
                    standing: Standing::of(&actor, view.header),
                    policy: &self.policy,
                    locks: view.locks,
                    current: view.current,
                    rule,
                },
                &field,
                &candidate,
            )
        })?;

        match &result {
            Ok(entry) => tracing::info!(
                entity = %entry.entity,
                field = %entry.field,
                actor = %entry.actor_id,
                sequence = entry.sequence,
                "edit committed"
            ),
            Err(cause) => tracing::warn!(
                entity = %tx.entity(),
                field = %field,
                %cause,
                "edit rejected at commit"
            ),
        }
        tx.settle(result)
    }

    /// Propose and justify in one call.
    pub fn edit(
        &self,
        actor: &Actor,
        entity: &EntityRef,
        field: &str,
        value: Value,
        reason: &str,
    ) -> Result<EditOutcome, GovernanceError> {
        let mut tx = self.view(actor, entity, field)?;
        let proposed = matches!(self.propose(&mut tx, value)?, EditState::Justifying { .. });
        if proposed {
            self.justify(&mut tx, reason)?;
        }
        tx.outcome().ok_or(GovernanceError::InvalidTransition {
            state: tx.state().name(),
            attempted: "complete",
        })
    }

    /// Everything a presentation surface needs to render one field.
    pub fn affordance(
        &self,
        actor: &Actor,
        entity: &EntityRef,
        field: &str,
    ) -> Result<Affordance, GovernanceError> {
        let module = self.module_for(entity, field)?;
        let header = self.store.record_header(entity)?;
        let value = self.store.read_field(entity, field)?;
        let locks = self.store.locks_for(entity);
        let standing = Standing::of(actor, &header);
        let lock = self
            .policy
            .blocking_lock(&locks, field, standing.role)
            .cloned();
        let can_edit = standing.can_edit();
        Ok(Affordance {
            entity: entity.clone(),
            field: field.to_string(),
            module,
            value,
            can_edit,
            editable: can_edit && lock.is_none(),
            allowed_actions: allowed_actions(standing.role, standing.is_owner),
            lock_message: lock.as_ref().map(lock_reason),
            lock,
        })
    }

    // ── Locks ───────────────────────────────────────────────────────

    /// Place a lock on a record, or on one governed field of it.
    ///
    /// `immutable` locks require delete rights (Admin); the other types
    /// require approve rights. The reason must meet the justification
    /// minimum. Placement and its audit entry land together.
    pub fn place_lock(
        &self,
        actor: &Actor,
        entity: &EntityRef,
        field: Option<&str>,
        lock_type: LockType,
        reason: &str,
    ) -> Result<LockOutcome, GovernanceError> {
        if lock_type == LockType::Unrecognized {
            return Ok(LockOutcome::Rejected {
                cause: RejectionCause::UnsupportedLockType { lock_type },
            });
        }
        if let Some(field) = field {
            self.module_for(entity, field)?;
        }
        let header = self.store.record_header(entity)?;
        let standing = Standing::of(actor, &header);
        let permitted = match lock_type {
            LockType::Immutable => can_delete(standing.role),
            _ => can_approve(standing.role),
        };
        if !permitted {
            return Ok(reject_lock(
                entity,
                RejectionCause::PermissionDenied {
                    role: standing.role,
                    is_owner: standing.is_owner,
                },
            ));
        }
        let reason = match check_justification(reason, self.config.min_justification_chars) {
            Ok(reason) => reason,
            Err(cause) => return Ok(reject_lock(entity, cause)),
        };

        let (lock, entry) = self.store.insert_lock(entity, &self.clock, |now| {
            let lock = LockRecord {
                id: LockId::new(),
                entity: entity.clone(),
                field: field.map(str::to_string),
                lock_type,
                locked_by: actor.name.clone(),
                locked_at: now,
                reason: reason.clone(),
            };
            let draft = AuditDraft {
                id: AuditEntryId::new(),
                action: AuditAction::LockPlaced,
                entity: entity.clone(),
                project_id: header.project_id,
                field: lock_type.audit_field(),
                old_value: Value::Null,
                new_value: lock_summary(&lock),
                reason,
                user_name: actor.name.clone(),
                actor_id: actor.id.clone(),
            };
            (lock, draft)
        })?;
        tracing::info!(
            %entity,
            lock_type = %lock_type,
            lock_id = %lock.id,
            actor = %actor.id,
            "lock placed"
        );
        Ok(LockOutcome::Placed { lock, entry })
    }

    /// Release a `baseline` lock. Admin only, with justification. Other lock
    /// types have no release path.
    pub fn release_lock(
        &self,
        actor: &Actor,
        entity: &EntityRef,
        lock_id: LockId,
        reason: &str,
    ) -> Result<LockOutcome, GovernanceError> {
        let lock = self
            .store
            .locks_for(entity)
            .into_iter()
            .find(|l| l.id == lock_id)
            .ok_or_else(|| crate::store::StoreError::LockNotFound {
                entity: entity.clone(),
                lock_id,
            })?;
        if lock.lock_type != LockType::Baseline {
            return Ok(reject_lock(
                entity,
                RejectionCause::UnsupportedLockType {
                    lock_type: lock.lock_type,
                },
            ));
        }
        let header = self.store.record_header(entity)?;
        let standing = Standing::of(actor, &header);
        if !can_unlock_baseline(standing.role) {
            return Ok(reject_lock(
                entity,
                RejectionCause::PermissionDenied {
                    role: standing.role,
                    is_owner: standing.is_owner,
                },
            ));
        }
        let reason = match check_justification(reason, self.config.min_justification_chars) {
            Ok(reason) => reason,
            Err(cause) => return Ok(reject_lock(entity, cause)),
        };

        let draft = AuditDraft {
            id: AuditEntryId::new(),
            action: AuditAction::LockReleased,
            entity: entity.clone(),
            project_id: header.project_id,
            field: lock.lock_type.audit_field(),
            old_value: lock_summary(&lock),
            new_value: Value::Null,
            reason,
            user_name: actor.name.clone(),
            actor_id: actor.id.clone(),
        };
        let (lock, entry) = self.store.remove_lock(entity, lock_id, &self.clock, draft)?;
        tracing::info!(%entity, lock_id = %lock.id, actor = %actor.id, "baseline lock released");
        Ok(LockOutcome::Released { lock, entry })
    }

    // ── Audit queries ───────────────────────────────────────────────

    /// Audit entries for one record, newest first.
    pub fn audit_log(&self, entity: &EntityRef) -> Vec<AuditEntry> {
        display_order(self.store.read_audit(|t| t.for_entity(entity)))
    }

    /// Audit entries for one field, newest first.
    pub fn field_history(&self, entity: &EntityRef, field: &str) -> Vec<AuditEntry> {
        display_order(self.store.read_audit(|t| t.for_field(entity, field)))
    }

    /// The most recently committed audit entry for one field.
    pub fn latest_audit(&self, entity: &EntityRef, field: &str) -> Option<AuditEntry> {
        self.store.read_audit(|t| t.latest_for_field(entity, field))
    }

    /// Audit entries for one project, newest first.
    pub fn project_audit(&self, project: &ProjectId) -> Vec<AuditEntry> {
        display_order(self.store.read_audit(|t| t.for_project(project)))
    }

    // ── Projections ─────────────────────────────────────────────────

    /// Freshness of every configured module of a project, in configuration
    /// order.
    pub fn freshness_report(&self, project: &ProjectId) -> Vec<FreshnessReading> {
        let now = self.clock.now();
        let readings = self
            .config
            .freshness
            .report(|module| self.store.module_last_updated(project, module), now);
        tracing::debug!(%project, modules = readings.len(), "freshness evaluated");
        readings
    }

    /// When a project's module was last edited.
    pub fn module_last_updated(&self, project: &ProjectId, module: DataModule) -> Option<Timestamp> {
        self.store.module_last_updated(project, module)
    }

    /// The project's phase, read from the `phase` field of its `project`
    /// record.
    pub fn project_phase(&self, project: &ProjectId) -> Result<ProjectPhase, GovernanceError> {
        let entity = EntityRef::parse(PROJECT_ENTITY_TYPE, project.as_str())?;
        match self.store.read_field(&entity, PHASE_FIELD)? {
            Value::String(s) => Ok(s.parse()?),
            _ => Err(GovernanceError::MissingPhase(project.clone())),
        }
    }

    /// Metric values tallied from a project's records.
    pub fn record_counts(&self, project: &ProjectId) -> RecordCounts {
        RecordCounts::tally(&self.store.project_records(project))
    }

    /// Completeness of a project for its current phase.
    pub fn completeness(&self, project: &ProjectId) -> Result<CompletenessReport, GovernanceError> {
        let phase = self.project_phase(project)?;
        let report = self
            .config
            .completeness
            .score(phase, &self.record_counts(project));
        tracing::debug!(
            %project,
            %phase,
            score = report.score,
            gaps = report.gaps.len(),
            "completeness scored"
        );
        Ok(report)
    }
}

fn reject_lock(entity: &EntityRef, cause: RejectionCause) -> LockOutcome {
    tracing::warn!(%entity, %cause, "lock operation rejected");
    LockOutcome::Rejected { cause }
}

fn lock_summary(lock: &LockRecord) -> Value {
    json!({
        "lock_id": lock.id.as_uuid().to_string(),
        "lock_type": lock.lock_type.as_str(),
        "field": lock.field,
        "locked_by": lock.locked_by,
        "locked_at": lock.locked_at.to_iso8601(),
        "reason": lock.reason,
    })
}
