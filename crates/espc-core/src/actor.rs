//! # Roles and Actors
//!
//! An [`Actor`] is the identity the session provider hands to governance at
//! session start. It carries a base [`Role`] and, per project, an optional
//! role override. Actors are immutable for the life of a session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{ActorId, ProjectId};

/// Roles in the governance model, ordered by privilege level.
///
/// The `Ord` derivation follows declaration order:
/// `Engineer < ProjectLead < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Field engineer. May edit only records they own.
    Engineer,
    /// Project lead. May edit and approve any record in the project.
    ProjectLead,
    /// Administrator. Full access, including deletes and baseline unlocks.
    Admin,
}

impl Role {
    /// All roles, in privilege order.
    pub const ALL: [Role; 3] = [Role::Engineer, Role::ProjectLead, Role::Admin];

    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engineer => "engineer",
            Self::ProjectLead => "project_lead",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "engineer" => Ok(Self::Engineer),
            "project_lead" => Ok(Self::ProjectLead),
            "admin" => Ok(Self::Admin),
            other => Err(ValidationError::UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Identity of the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable actor identifier (matches record ownership).
    pub id: ActorId,
    /// Display name, recorded on audit entries.
    pub name: String,
    /// Base role.
    pub role: Role,
    /// Per-project role overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub project_roles: BTreeMap<ProjectId, Role>,
}

impl Actor {
    /// Create an actor with no project overrides.
    pub fn new(id: ActorId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            project_roles: BTreeMap::new(),
        }
    }

    /// Add a per-project role override.
    pub fn with_project_role(mut self, project: ProjectId, role: Role) -> Self {
        self.project_roles.insert(project, role);
        self
    }

    /// The effective role within `project`: the override when present,
    /// otherwise the base role.
    pub fn role_for(&self, project: &ProjectId) -> Role {
        self.project_roles.get(project).copied().unwrap_or(self.role)
    }
}
