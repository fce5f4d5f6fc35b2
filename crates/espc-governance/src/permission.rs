//! # Permission Authority
//!
//! Pure, total functions of `(role, is_owner)` or `(role)` alone. No I/O,
//! no errors, no hidden state: the edit transaction calls these inside its
//! validation step and again inside the commit critical section, and both
//! calls must agree.
//!
//! | Predicate              | Engineer    | ProjectLead | Admin |
//! |------------------------|-------------|-------------|-------|
//! | `can_edit`             | owner only  | yes         | yes   |
//! | `can_delete`           | no          | no          | yes   |
//! | `can_approve`          | no          | yes         | yes   |
//! | `can_unlock_baseline`  | no          | no          | yes   |

use serde::{Deserialize, Serialize};

use espc_core::{Actor, Role};

use crate::store::RecordHeader;

/// Whether `role` may edit a record, given whether the actor owns it.
pub fn can_edit(role: Role, is_owner: bool) -> bool {
    match role {
        Role::Admin | Role::ProjectLead => true,
        Role::Engineer => is_owner,
    }
}

/// Whether `role` may delete records.
pub fn can_delete(role: Role) -> bool {
    matches!(role, Role::Admin)
}

/// Whether `role` may approve records (and place approval-class locks).
pub fn can_approve(role: Role) -> bool {
    matches!(role, Role::Admin | Role::ProjectLead)
}

/// Whether `role` may override or release a `baseline` lock.
pub fn can_unlock_baseline(role: Role) -> bool {
    matches!(role, Role::Admin)
}

/// A named capability granted by the permission authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Edit fields of the record.
    Edit,
    /// Delete the record.
    Delete,
    /// Approve the record.
    Approve,
    /// Override or release baseline locks.
    UnlockBaseline,
}

impl Permission {
    /// All permissions, in evaluation order.
    pub const ALL: [Permission; 4] = [
        Permission::Edit,
        Permission::Delete,
        Permission::Approve,
        Permission::UnlockBaseline,
    ];

    /// Whether this permission is granted to `role` with the given ownership.
    pub fn granted(&self, role: Role, is_owner: bool) -> bool {
        match self {
            Self::Edit => can_edit(role, is_owner),
            Self::Delete => can_delete(role),
            Self::Approve => can_approve(role),
            Self::UnlockBaseline => can_unlock_baseline(role),
        }
    }

    /// Return the string identifier of this permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::UnlockBaseline => "unlock_baseline",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every permission granted to `role` with the given ownership, in
/// [`Permission::ALL`] order.
pub fn allowed_actions(role: Role, is_owner: bool) -> Vec<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|p| p.granted(role, is_owner))
        .collect()
}

/// The role and ownership an actor holds with respect to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    /// Effective role in the record's project.
    pub role: Role,
    /// Whether the actor owns the record.
    pub is_owner: bool,
}

impl Standing {
    /// Resolve an actor's standing against a record header.
    pub fn of(actor: &Actor, record: &RecordHeader) -> Self {
        Self {
            role: actor.role_for(&record.project_id),
            is_owner: record.owner.as_ref() == Some(&actor.id),
        }
    }

    /// Shorthand for [`can_edit`] on this standing.
    pub fn can_edit(&self) -> bool {
        can_edit(self.role, self.is_owner)
    }
}
