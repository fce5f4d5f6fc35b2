//! # Audit Trail
//!
//! Append-only record of every committed governance mutation: field edits,
//! lock placements and lock releases.
//!
//! ## Invariants
//!
//! - Entries are never mutated or removed. [`AuditTrail`] exposes no API
//!   that could do either.
//! - Exactly one entry per committed edit; none for a no-op edit.
//! - Creation order is the source of truth. Each entry carries a
//!   store-assigned `sequence`, strictly increasing across the whole trail,
//!   so entries for any one record are totally ordered by commit.
//! - Display order is newest first: timestamp descending, ties broken by
//!   sequence descending.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use espc_core::{ActorId, EntityRef, ProjectId, Timestamp};

/// Unique identifier for an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(Uuid);

impl AuditEntryId {
    /// Generate a new random audit entry identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "audit:{}", self.0)
    }
}

/// What kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A governed field changed value.
    FieldEdit,
    /// A lock was placed on the record.
    LockPlaced,
    /// A baseline lock was released.
    LockReleased,
}

impl AuditAction {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FieldEdit => "field_edit",
            Self::LockPlaced => "lock_placed",
            Self::LockReleased => "lock_released",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit entry before the store has sequenced and stamped it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    /// Entry identifier.
    pub id: AuditEntryId,
    /// Kind of mutation.
    pub action: AuditAction,
    /// The record mutated.
    pub entity: EntityRef,
    /// The record's project.
    pub project_id: ProjectId,
    /// Field name, or `lock:<type>` for lock actions.
    pub field: String,
    /// Value before the mutation.
    pub old_value: Value,
    /// Value after the mutation.
    pub new_value: Value,
    /// Justification supplied by the actor.
    pub reason: String,
    /// Display name of the actor.
    pub user_name: String,
    /// Actor identifier.
    pub actor_id: ActorId,
}

impl AuditDraft {
    /// Seal the draft with its position in the trail and its commit time.
    pub fn sequenced(self, sequence: u64, timestamp: Timestamp) -> AuditEntry {
        AuditEntry {
            id: self.id,
            sequence,
            action: self.action,
            entity: self.entity,
            project_id: self.project_id,
            field: self.field,
            old_value: self.old_value,
            new_value: self.new_value,
            reason: self.reason,
            user_name: self.user_name,
            actor_id: self.actor_id,
            timestamp,
        }
    }
}

/// A single, immutable audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry identifier.
    pub id: AuditEntryId,
    /// Position in the trail (1-based, strictly increasing).
    pub sequence: u64,
    /// Kind of mutation.
    pub action: AuditAction,
    /// The record mutated.
    #[serde(flatten)]
    pub entity: EntityRef,
    /// The record's project.
    pub project_id: ProjectId,
    /// Field name, or `lock:<type>` for lock actions.
    pub field: String,
    /// Value before the mutation.
    pub old_value: Value,
    /// Value after the mutation.
    pub new_value: Value,
    /// Justification supplied by the actor.
    pub reason: String,
    /// Display name of the actor.
    pub user_name: String,
    /// Actor identifier.
    pub actor_id: ActorId,
    /// Commit time.
    pub timestamp: Timestamp,
}

/// Append-only audit trail.
///
/// Not `Sync` on its own; stores wrap it in their own lock so that appending
/// shares a critical section with the value write it describes.
#[derive(Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence and append a draft stamped at `at`, returning the sealed
    /// entry.
    pub fn append(&mut self, draft: AuditDraft, at: Timestamp) -> AuditEntry {
        let sequence = self.entries.last().map_or(1, |e| e.sequence + 1);
        let entry = draft.sequenced(sequence, at);
        self.entries.push(entry.clone());
        entry
    }

    /// All entries in creation order.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for one record, in creation order.
    pub fn for_entity(&self, entity: &EntityRef) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| &e.entity == entity)
            .cloned()
            .collect()
    }

    /// Entries for one field of one record, in creation order.
    pub fn for_field(&self, entity: &EntityRef, field: &str) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| &e.entity == entity && e.field == field)
            .cloned()
            .collect()
    }

    /// The most recently committed entry for one field of one record.
    pub fn latest_for_field(&self, entity: &EntityRef, field: &str) -> Option<AuditEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| &e.entity == entity && e.field == field)
            .cloned()
    }

    /// Entries for one project, in creation order.
    pub fn for_project(&self, project: &ProjectId) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| &e.project_id == project)
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Sort entries into display order: newest timestamp first, ties broken by
/// sequence (later commit first).
pub fn display_order(mut entries: Vec<AuditEntry>) -> Vec<AuditEntry> {
    entries.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(entity: &str, field: &str, new_value: Value) -> AuditDraft {
        AuditDraft {
            id: AuditEntryId::new(),
            action: AuditAction::FieldEdit,
            entity: EntityRef::parse("asset", entity).unwrap(),
            project_id: ProjectId::new("p-1").unwrap(),
            field: field.into(),
            old_value: Value::Null,
            new_value,
            reason: "nameplate photographed on site".into(),
            user_name: "Sam Engineer".into(),
            actor_id: ActorId::new("eng-1").unwrap(),
        }
    }

    fn at(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn append_assigns_increasing_sequence() {
        let mut trail = AuditTrail::new();
        let a = trail.append(draft("A-1", "make", json!("Trane")), at("2026-01-01T00:00:00Z"));
        let b = trail.append(draft("A-2", "make", json!("Carrier")), at("2026-01-01T00:00:00Z"));
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(trail.len(), 2);
    }

    #[test]
    fn queries_filter_by_entity_and_field() {
        let mut trail = AuditTrail::new();
        trail.append(draft("A-1", "make", json!("Trane")), at("2026-01-01T00:00:00Z"));
        trail.append(draft("A-1", "model", json!("XR-13")), at("2026-01-02T00:00:00Z"));
        trail.append(draft("A-2", "make", json!("Carrier")), at("2026-01-03T00:00:00Z"));
        trail.append(draft("A-1", "make", json!("Lennox")), at("2026-01-04T00:00:00Z"));

        let a1 = EntityRef::parse("asset", "A-1").unwrap();
        assert_eq!(trail.for_entity(&a1).len(), 3);
        assert_eq!(trail.for_field(&a1, "make").len(), 2);
        assert_eq!(
            trail.latest_for_field(&a1, "make").unwrap().new_value,
            json!("Lennox")
        );
        assert!(trail.latest_for_field(&a1, "serial").is_none());
    }

    #[test]
    fn display_order_newest_first_with_sequence_tiebreak() {
        let mut trail = AuditTrail::new();
        trail.append(draft("A-1", "make", json!(1)), at("2026-01-01T00:00:00Z"));
        trail.append(draft("A-1", "make", json!(2)), at("2026-01-05T00:00:00Z"));
        trail.append(draft("A-1", "make", json!(3)), at("2026-01-05T00:00:00Z"));
        let ordered = display_order(trail.entries().to_vec());
        let seqs: Vec<u64> = ordered.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![3, 2, 1]);
    }

    #[test]
    fn entry_serializes_flat_entity() {
        let mut trail = AuditTrail::new();
        let entry = trail.append(draft("A-1", "make", json!("Trane")), at("2026-01-01T00:00:00Z"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["entity_type"], "asset");
        assert_eq!(json["entity_id"], "A-1");
        assert_eq!(json["action"], "field_edit");
        assert_eq!(json["timestamp"], "2026-01-01T00:00:00Z");
    }
}
