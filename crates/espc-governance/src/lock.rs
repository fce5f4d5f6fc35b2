//! # Lock Registry Types and Precedence Policy
//!
//! A lock is a governance flag on a record (optionally on a single field of
//! it) that prevents mutation. Locks carry an origin type, who placed them,
//! when, and why.
//!
//! ## Precedence
//!
//! Lock precedence is an explicit table rather than scattered conditionals:
//!
//! | Lock type      | Rank | Overridable by                 |
//! |----------------|------|--------------------------------|
//! | `immutable`    | 5    | never                          |
//! | `signed`       | 4    | never                          |
//! | `approval`     | 3    | never                          |
//! | *unrecognized* | 2    | never                          |
//! | `baseline`     | 1    | `Permission::UnlockBaseline`   |
//!
//! Every lock covering the target field is evaluated the same way. When
//! several block, the highest-ranked one is reported (most restrictive wins).
//!
//! ## Lifecycle
//!
//! Locks are never silently removed. The only release path is the governed
//! release of a `baseline` lock by an actor passing `can_unlock_baseline`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use espc_core::{EntityRef, Role, Timestamp};

use crate::permission::Permission;

/// Unique identifier for a lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(Uuid);

impl LockId {
    /// Generate a new random lock identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock:{}", self.0)
    }
}

/// Origin type of a lock.
///
/// `Unrecognized` absorbs lock types written by other producers that this
/// build does not know. It is treated as a non-overridable lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockType {
    /// Record approved by a project lead or admin.
    Approval,
    /// Record is part of the contract baseline.
    Baseline,
    /// Record has been signed; legally final.
    Signed,
    /// Record is permanently frozen.
    Immutable,
    /// A lock type this build does not recognize.
    #[serde(other)]
    Unrecognized,
}

impl LockType {
    /// The lock types that can be placed through the engine.
    pub const PLACEABLE: [LockType; 4] = [
        LockType::Approval,
        LockType::Baseline,
        LockType::Signed,
        LockType::Immutable,
    ];

    /// Return the string identifier of this lock type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Baseline => "baseline",
            Self::Signed => "signed",
            Self::Immutable => "immutable",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Pseudo-field name under which lock placement and release are audited.
    pub fn audit_field(&self) -> String {
        format!("lock:{}", self.as_str())
    }
}

impl std::fmt::Display for LockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LockType {
    type Err = espc_core::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PLACEABLE
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| espc_core::ValidationError::UnknownVariant {
                kind: "lock type",
                value: s.trim().to_string(),
            })
    }
}

/// An active lock on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Lock identifier.
    pub id: LockId,
    /// The locked record.
    pub entity: EntityRef,
    /// When set, only this field is locked; otherwise the whole record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Origin type.
    pub lock_type: LockType,
    /// Display name of whoever placed the lock.
    pub locked_by: String,
    /// When the lock was placed.
    pub locked_at: Timestamp,
    /// Human-readable reason.
    pub reason: String,
}

impl LockRecord {
    /// Whether this lock applies to `field` of its record.
    pub fn covers(&self, field: &str) -> bool {
        self.field.as_deref().map_or(true, |f| f == field)
    }
}

/// Who, if anyone, can edit through a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "permission")]
pub enum Override {
    /// No role can edit through this lock.
    Never,
    /// Actors granted this permission can edit through the lock.
    Permission(Permission),
}

/// One row of the lock precedence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRule {
    /// The lock type this rule governs.
    pub lock_type: LockType,
    /// Restrictiveness; higher wins when several locks block.
    pub rank: u8,
    /// Override path.
    pub override_by: Override,
}

impl LockRule {
    /// Whether a lock governed by this rule blocks an actor with `role`.
    pub fn blocks(&self, role: Role) -> bool {
        match self.override_by {
            Override::Never => true,
            // Overrides never depend on ownership.
            Override::Permission(p) => !p.granted(role, false),
        }
    }
}

/// The lock precedence table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPolicy {
    rules: Vec<LockRule>,
}

impl LockPolicy {
    /// The standard precedence table.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                LockRule {
                    lock_type: LockType::Immutable,
                    rank: 5,
                    override_by: Override::Never,
                },
                LockRule {
                    lock_type: LockType::Signed,
                    rank: 4,
                    override_by: Override::Never,
                },
                LockRule {
                    lock_type: LockType::Approval,
                    rank: 3,
                    override_by: Override::Never,
                },
                LockRule {
                    lock_type: LockType::Unrecognized,
                    rank: 2,
                    override_by: Override::Never,
                },
                LockRule {
                    lock_type: LockType::Baseline,
                    rank: 1,
                    override_by: Override::Permission(Permission::UnlockBaseline),
                },
            ],
        }
    }

    /// The rule for `lock_type`. Types missing from the table fall back to
    /// the `Unrecognized` rule.
    pub fn rule(&self, lock_type: LockType) -> LockRule {
        self.rules
            .iter()
            .find(|r| r.lock_type == lock_type)
            .copied()
            .unwrap_or(LockRule {
                lock_type,
                rank: 2,
                override_by: Override::Never,
            })
    }

    /// Whether `lock` blocks an actor with `role`.
    pub fn is_blocking(&self, lock: &LockRecord, role: Role) -> bool {
        self.rule(lock.lock_type).blocks(role)
    }

    /// The most restrictive lock among `locks` that covers `field` and that
    /// `role` cannot override, if any.
    ///
    /// Ties on rank resolve to the earliest-placed lock, so the answer does
    /// not depend on the order the store returns locks in.
    pub fn blocking_lock<'a>(
        &self,
        locks: &'a [LockRecord],
        field: &str,
        role: Role,
    ) -> Option<&'a LockRecord> {
        locks
            .iter()
            .filter(|l| l.covers(field) && self.is_blocking(l, role))
            .max_by(|a, b| {
                self.rule(a.lock_type)
                    .rank
                    .cmp(&self.rule(b.lock_type).rank)
                    .then_with(|| b.locked_at.cmp(&a.locked_at))
                    .then_with(|| b.id.cmp(&a.id))
            })
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Render the human-facing explanation for a lock (tooltip text).
///
/// Known lock types get a fixed message interpolating who, when and why.
/// Unrecognized types fall back to the raw reason, or a generic message
/// when the reason is blank. Never fails.
pub fn lock_reason(lock: &LockRecord) -> String {
    let by = lock.locked_by.trim();
    let on = lock.locked_at.as_datetime().format("%Y-%m-%d");
    let why = lock.reason.trim();
    match lock.lock_type {
        LockType::Approval => {
            format!("Approved by {by} on {on}. Approved records cannot be edited. Reason: {why}")
        }
        LockType::Baseline => format!(
            "Baseline locked by {by} on {on}. Only an administrator can change baseline data. Reason: {why}"
        ),
        LockType::Signed => format!(
            "Signed by {by} on {on}. Signed records are contractually final. Reason: {why}"
        ),
        LockType::Immutable => format!(
            "Permanently locked by {by} on {on}. This record cannot be changed. Reason: {why}"
        ),
        LockType::Unrecognized if !why.is_empty() => why.to_string(),
        LockType::Unrecognized => "This record is locked.".to_string(),
    }
}
