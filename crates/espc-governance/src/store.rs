//! # Record Store
//!
//! The engine is stateless: every record, lock, audit entry and module
//! timestamp lives behind the [`GovernanceStore`] trait, injected into
//! [`GovernanceEngine`](crate::engine::GovernanceEngine). Records are opaque
//! bags of named JSON fields; the store does not know field schemas.
//!
//! ## Atomicity
//!
//! [`GovernanceStore::commit_edit`] is the only path that writes a field. It
//! runs a caller-supplied guard and, if the guard passes, performs the value
//! write, the audit append and the module timestamp bump, all under a single
//! write lock. Readers either see all three effects or none.
//!
//! Audit entries are stamped from the caller's [`Clock`] inside that same
//! critical section, so sequence order and timestamp order agree for any
//! clock that does not run backwards.
//!
//! [`InMemoryStore`] is the shipped implementation. It holds its state in a
//! `parking_lot::RwLock` behind an `Arc`, so clones share one store.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use espc_core::{ActorId, Clock, DataModule, EntityRef, ProjectId, Timestamp};

use crate::audit::{AuditDraft, AuditEntry, AuditTrail};
use crate::lock::{LockId, LockRecord};

/// Record store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record exists for the reference.
    #[error("record {0} not found")]
    RecordNotFound(EntityRef),

    /// A record with the same reference already exists.
    #[error("record {0} already exists")]
    DuplicateRecord(EntityRef),

    /// The lock is not active on the record.
    #[error("lock {lock_id} not found on {entity}")]
    LockNotFound {
        /// The record.
        entity: EntityRef,
        /// The missing lock.
        lock_id: LockId,
    },

    /// A lock with the same id already exists.
    #[error("lock {0} already exists")]
    DuplicateLock(LockId),
}

/// The governance-relevant metadata of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Project the record belongs to.
    pub project_id: ProjectId,
    /// Owning actor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ActorId>,
}

/// A governed record: header plus named field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The record's reference.
    #[serde(flatten)]
    pub entity: EntityRef,
    /// Project the record belongs to.
    pub project_id: ProjectId,
    /// Owning actor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ActorId>,
    /// Field values by name.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// An empty, unowned record.
    pub fn new(entity: EntityRef, project_id: ProjectId) -> Self {
        Self {
            entity,
            project_id,
            owner: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner: ActorId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set a field value.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// The record's header.
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            project_id: self.project_id.clone(),
            owner: self.owner.clone(),
        }
    }

    /// Read a field. Absent fields read as `null`.
    pub fn field(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or(Value::Null)
    }
}

/// What a commit guard sees, under the store's write lock.
#[derive(Debug)]
pub struct GuardView<'a> {
    /// Header of the record being edited.
    pub header: &'a RecordHeader,
    /// Current value of the field.
    pub current: &'a Value,
    /// Active locks on the record.
    pub locks: &'a [LockRecord],
}

/// A validated field edit ready to commit.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    /// The module whose timestamp the commit advances.
    pub module: DataModule,
    /// The audit entry to append. The store overwrites `old_value` with the
    /// value actually replaced and stamps the commit time.
    pub audit: AuditDraft,
}

/// Storage seam for the governance engine.
pub trait GovernanceStore: Send + Sync {
    /// Header of one record.
    fn record_header(&self, entity: &EntityRef) -> Result<RecordHeader, StoreError>;

    /// Current value of one field. Absent fields read as `null`.
    fn read_field(&self, entity: &EntityRef, field: &str) -> Result<Value, StoreError>;

    /// All active locks on one record.
    fn locks_for(&self, entity: &EntityRef) -> Vec<LockRecord>;

    /// Run `guard` and, if it passes, write the new value, append the audit
    /// entry stamped with `clock` and advance the module timestamp as one
    /// unit.
    ///
    /// The outer `Result` reports store faults; the inner one carries the
    /// guard's rejection, in which case nothing was written.
    fn commit_edit<E>(
        &self,
        edit: PendingEdit,
        clock: &dyn Clock,
        guard: impl FnOnce(&GuardView<'_>) -> Result<(), E>,
    ) -> Result<Result<AuditEntry, E>, StoreError>;

    /// Add a lock and append its audit entry as one unit. `build` receives
    /// the commit time read from `clock` and returns the lock and its draft.
    fn insert_lock(
        &self,
        entity: &EntityRef,
        clock: &dyn Clock,
        build: impl FnOnce(Timestamp) -> (LockRecord, AuditDraft),
    ) -> Result<(LockRecord, AuditEntry), StoreError>;

    /// Remove a lock and append its audit entry, stamped with `clock`, as
    /// one unit. Returns the removed lock.
    fn remove_lock(
        &self,
        entity: &EntityRef,
        lock_id: LockId,
        clock: &dyn Clock,
        audit: AuditDraft,
    ) -> Result<(LockRecord, AuditEntry), StoreError>;

    /// Run a read-only query against the audit trail.
    fn read_audit<R>(&self, query: impl FnOnce(&AuditTrail) -> R) -> R;

    /// Last committed edit time for a project's module.
    fn module_last_updated(&self, project: &ProjectId, module: DataModule) -> Option<Timestamp>;

    /// All records belonging to a project, ordered by reference.
    fn project_records(&self, project: &ProjectId) -> Vec<Record>;
}

#[derive(Default)]
struct State {
    records: BTreeMap<EntityRef, Record>,
    locks: BTreeMap<EntityRef, Vec<LockRecord>>,
    audit: AuditTrail,
    module_updated: BTreeMap<(ProjectId, DataModule), Timestamp>,
}

/// Thread-safe, cloneable in-memory store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record.
    pub fn insert_record(&self, record: Record) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.records.contains_key(&record.entity) {
            return Err(StoreError::DuplicateRecord(record.entity));
        }
        state.records.insert(record.entity.clone(), record);
        Ok(())
    }

    /// Load a pre-existing lock without auditing it.
    pub fn seed_lock(&self, lock: LockRecord) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if !state.records.contains_key(&lock.entity) {
            return Err(StoreError::RecordNotFound(lock.entity));
        }
        push_lock(&mut state, lock)
    }

    /// Load a pre-existing module timestamp. Never moves a timestamp back.
    pub fn seed_module_timestamp(&self, project: ProjectId, module: DataModule, at: Timestamp) {
        bump(&mut self.state.write().module_updated, project, module, at);
    }

    /// Snapshot of one record.
    pub fn record(&self, entity: &EntityRef) -> Option<Record> {
        self.state.read().records.get(entity).cloned()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InMemoryStore")
            .field("records", &state.records.len())
            .field("locks", &state.locks.values().map(Vec::len).sum::<usize>())
            .field("audit", &state.audit)
            .finish()
    }
}

fn push_lock(state: &mut State, lock: LockRecord) -> Result<(), StoreError> {
    if state.locks.values().flatten().any(|l| l.id == lock.id) {
        return Err(StoreError::DuplicateLock(lock.id));
    }
    state.locks.entry(lock.entity.clone()).or_default().push(lock);
    Ok(())
}

fn bump(
    table: &mut BTreeMap<(ProjectId, DataModule), Timestamp>,
    project: ProjectId,
    module: DataModule,
    at: Timestamp,
) {
    let slot = table.entry((project, module)).or_insert(at);
    if at > *slot {
        *slot = at;
    }
}

impl GovernanceStore for InMemoryStore {
    fn record_header(&self, entity: &EntityRef) -> Result<RecordHeader, StoreError> {
        self.state
            .read()
            .records
            .get(entity)
            .map(Record::header)
            .ok_or_else(|| StoreError::RecordNotFound(entity.clone()))
    }

    fn read_field(&self, entity: &EntityRef, field: &str) -> Result<Value, StoreError> {
        self.state
            .read()
            .records
            .get(entity)
            .map(|r| r.field(field))
            .ok_or_else(|| StoreError::RecordNotFound(entity.clone()))
    }

    fn locks_for(&self, entity: &EntityRef) -> Vec<LockRecord> {
        self.state
            .read()
            .locks
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }

    fn commit_edit<E>(
        &self,
        edit: PendingEdit,
        clock: &dyn Clock,
        guard: impl FnOnce(&GuardView<'_>) -> Result<(), E>,
    ) -> Result<Result<AuditEntry, E>, StoreError> {
        let PendingEdit { module, mut audit } = edit;
        let mut state = self.state.write();
        let state = &mut *state;

        let record = state
            .records
            .get_mut(&audit.entity)
            .ok_or_else(|| StoreError::RecordNotFound(audit.entity.clone()))?;
        let header = record.header();
        let current = record.field(&audit.field);
        let locks = state
            .locks
            .get(&audit.entity)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if let Err(rejection) = guard(&GuardView {
            header: &header,
            current: &current,
            locks,
        }) {
            return Ok(Err(rejection));
        }

        record
            .fields
            .insert(audit.field.clone(), audit.new_value.clone());
        audit.old_value = current;
        audit.project_id = header.project_id.clone();
        let at = clock.now();
        let entry = state.audit.append(audit, at);
        bump(&mut state.module_updated, header.project_id, module, at);
        Ok(Ok(entry))
    }

    fn insert_lock(
        &self,
        entity: &EntityRef,
        clock: &dyn Clock,
        build: impl FnOnce(Timestamp) -> (LockRecord, AuditDraft),
    ) -> Result<(LockRecord, AuditEntry), StoreError> {
        let mut state = self.state.write();
        if !state.records.contains_key(entity) {
            return Err(StoreError::RecordNotFound(entity.clone()));
        }
        let at = clock.now();
        let (lock, audit) = build(at);
        push_lock(&mut state, lock.clone())?;
        Ok((lock, state.audit.append(audit, at)))
    }

    fn remove_lock(
        &self,
        entity: &EntityRef,
        lock_id: LockId,
        clock: &dyn Clock,
        audit: AuditDraft,
    ) -> Result<(LockRecord, AuditEntry), StoreError> {
        let mut state = self.state.write();
        let not_found = || StoreError::LockNotFound {
            entity: entity.clone(),
            lock_id,
        };
        let locks = state.locks.get_mut(entity).ok_or_else(not_found)?;
        let index = locks
            .iter()
            .position(|l| l.id == lock_id)
            .ok_or_else(not_found)?;
        let removed = locks.remove(index);
        if locks.is_empty() {
            state.locks.remove(entity);
        }
        let entry = state.audit.append(audit, clock.now());
        Ok((removed, entry))
    }

    fn read_audit<R>(&self, query: impl FnOnce(&AuditTrail) -> R) -> R {
        query(&self.state.read().audit)
    }

    fn module_last_updated(&self, project: &ProjectId, module: DataModule) -> Option<Timestamp> {
        self.state
            .read()
            .module_updated
            .get(&(project.clone(), module))
            .copied()
    }

    fn project_records(&self, project: &ProjectId) -> Vec<Record> {
        self.state
            .read()
            .records
            .values()
            .filter(|r| &r.project_id == project)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, AuditEntryId};
    use crate::lock::LockType;
    use espc_core::ManualClock;
    use serde_json::json;

    fn asset() -> EntityRef {
        EntityRef::parse("asset", "AHU-1").unwrap()
    }

    fn project() -> ProjectId {
        ProjectId::new("p-1").unwrap()
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_record(Record::new(asset(), project()).with_field("make", json!("Trane")))
            .unwrap();
        store
    }

    fn clock(at: &str) -> ManualClock {
        ManualClock::new(Timestamp::parse(at).unwrap())
    }

    fn draft(value: Value) -> AuditDraft {
        AuditDraft {
            id: AuditEntryId::new(),
            action: AuditAction::FieldEdit,
            entity: asset(),
            project_id: project(),
            field: "make".into(),
            old_value: Value::Null,
            new_value: value,
            reason: "nameplate photographed".into(),
            user_name: "Sam".into(),
            actor_id: ActorId::new("eng-1").unwrap(),
        }
    }

    fn pending(value: Value) -> PendingEdit {
        PendingEdit {
            module: DataModule::Assets,
            audit: draft(value),
        }
    }

    #[test]
    fn commit_writes_value_audit_and_timestamp() {
        let store = store();
        let entry = store
            .commit_edit(pending(json!("Carrier")), &clock("2026-03-01T00:00:00Z"), |_| {
                Ok::<_, ()>(())
            })
            .unwrap()
            .unwrap();
        assert_eq!(entry.old_value, json!("Trane"));
        assert_eq!(entry.timestamp, Timestamp::parse("2026-03-01T00:00:00Z").unwrap());
        assert_eq!(store.read_field(&asset(), "make").unwrap(), json!("Carrier"));
        assert_eq!(store.read_audit(|t| t.len()), 1);
        assert_eq!(
            store.module_last_updated(&project(), DataModule::Assets),
            Some(Timestamp::parse("2026-03-01T00:00:00Z").unwrap())
        );
    }

    #[test]
    fn rejected_guard_leaves_no_trace() {
        let store = store();
        let result = store
            .commit_edit(pending(json!("Carrier")), &clock("2026-03-01T00:00:00Z"), |view| {
                assert_eq!(view.current, &json!("Trane"));
                Err("nope")
            })
            .unwrap();
        assert_eq!(result, Err("nope"));
        assert_eq!(store.read_field(&asset(), "make").unwrap(), json!("Trane"));
        assert!(store.read_audit(|t| t.is_empty()));
        assert_eq!(store.module_last_updated(&project(), DataModule::Assets), None);
    }

    #[test]
    fn module_timestamp_never_decreases() {
        let store = store();
        let clock = clock("2026-03-05T00:00:00Z");
        store
            .commit_edit(pending(json!("A")), &clock, |_| Ok::<_, ()>(()))
            .unwrap()
            .unwrap();
        clock.set(Timestamp::parse("2026-03-01T00:00:00Z").unwrap());
        store
            .commit_edit(pending(json!("B")), &clock, |_| Ok::<_, ()>(()))
            .unwrap()
            .unwrap();
        assert_eq!(
            store.module_last_updated(&project(), DataModule::Assets),
            Some(Timestamp::parse("2026-03-05T00:00:00Z").unwrap())
        );
    }

    #[test]
    fn absent_field_reads_null_and_unknown_record_errors() {
        let store = store();
        assert_eq!(store.read_field(&asset(), "serial").unwrap(), Value::Null);
        let missing = EntityRef::parse("asset", "nope").unwrap();
        assert_eq!(
            store.read_field(&missing, "make").unwrap_err(),
            StoreError::RecordNotFound(missing)
        );
    }

    #[test]
    fn lock_insert_and_remove_are_audited() {
        let store = store();
        let clock = clock("2026-03-01T00:00:00Z");
        let (lock, placed) = store
            .insert_lock(&asset(), &clock, |at| {
                let lock = LockRecord {
                    id: LockId::new(),
                    entity: asset(),
                    field: None,
                    lock_type: LockType::Baseline,
                    locked_by: "Avery".into(),
                    locked_at: at,
                    reason: "Contract baseline".into(),
                };
                (lock, draft(Value::Null))
            })
            .unwrap();
        assert_eq!(lock.locked_at, placed.timestamp);
        assert_eq!(store.locks_for(&asset()), vec![lock.clone()]);

        clock.advance_days(1);
        let (removed, entry) = store
            .remove_lock(&asset(), lock.id, &clock, draft(Value::Null))
            .unwrap();
        assert_eq!(removed, lock);
        assert_eq!(entry.sequence, 2);
        assert_eq!(entry.timestamp, Timestamp::parse("2026-03-02T00:00:00Z").unwrap());
        assert!(store.locks_for(&asset()).is_empty());
        assert!(matches!(
            store.remove_lock(&asset(), lock.id, &clock, draft(Value::Null)),
            Err(StoreError::LockNotFound { .. })
        ));
    }

    #[test]
    fn commit_time_is_read_after_the_guard_passes() {
        let store = store();
        let clock = clock("2026-03-01T00:00:00Z");
        let entry = store
            .commit_edit(pending(json!("Carrier")), &clock, |_| {
                clock.advance_secs(30);
                Ok::<_, ()>(())
            })
            .unwrap()
            .unwrap();
        assert_eq!(entry.timestamp, Timestamp::parse("2026-03-01T00:00:30Z").unwrap());
        assert_eq!(
            store.module_last_updated(&project(), DataModule::Assets),
            Some(entry.timestamp)
        );
    }

    #[test]
    fn duplicate_record_rejected() {
        let store = store();
        assert_eq!(
            store.insert_record(Record::new(asset(), project())).unwrap_err(),
            StoreError::DuplicateRecord(asset())
        );
    }

    #[test]
    fn clones_share_state() {
        let a = store();
        let b = a.clone();
        b.insert_record(Record::new(EntityRef::parse("building", "B-1").unwrap(), project()))
            .unwrap();
        assert_eq!(a.project_records(&project()).len(), 2);
    }
}
