//! # Governance Errors
//!
//! Faults that are not governance rejections. A rejected edit (no change,
//! permission denied, lock violation, justification too short) is a
//! [`RejectionCause`](crate::edit::RejectionCause) value, never one of these.

use thiserror::Error;

use espc_core::{ConfigError, EntityType, ProjectId, ValidationError};

use crate::store::StoreError;

/// Errors from the governance engine.
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// The field is not in the editable-field catalog for its entity type.
    #[error("field {field:?} of entity type {entity_type} is not governed")]
    FieldNotGoverned {
        /// Entity type of the record.
        entity_type: EntityType,
        /// Requested field name.
        field: String,
    },

    /// A transition was requested from a state that does not allow it.
    #[error("cannot {attempted} an edit in state {state}")]
    InvalidTransition {
        /// Current state name.
        state: &'static str,
        /// Requested operation.
        attempted: &'static str,
    },

    /// The project record has no readable `phase` field.
    #[error("project {0} has no phase")]
    MissingPhase(ProjectId),

    /// Record store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed input value.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}
