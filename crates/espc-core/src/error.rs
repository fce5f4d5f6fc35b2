//! # Error Hierarchy
//!
//! Structured error types for the ESPC governance stack, built with
//! `thiserror`. No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Governance *rejections* (no change, permission denied, lock violation,
//! justification too short) are not errors and do not appear here; they are
//! typed outcomes of the edit transaction. The types below cover malformed
//! inputs and startup configuration faults.

use thiserror::Error;

/// Top-level error type for the ESPC governance stack.
#[derive(Error, Debug)]
pub enum EspcError {
    /// Domain primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration rejected at load time.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors constructing domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifier was empty after trimming.
    #[error("{kind} must not be empty")]
    EmptyIdentifier {
        /// Which identifier kind was being constructed.
        kind: &'static str,
    },

    /// An identifier exceeded the maximum length.
    #[error("{kind} exceeds {max} characters (got {len})")]
    IdentifierTooLong {
        /// Which identifier kind was being constructed.
        kind: &'static str,
        /// Maximum permitted length.
        max: usize,
        /// Actual length.
        len: usize,
    },

    /// A timestamp string could not be parsed.
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A string did not name a known variant of a closed vocabulary.
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant {
        /// The vocabulary (e.g. "role", "project phase").
        kind: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Startup configuration faults.
///
/// These are detected once, when configuration is loaded, and never surface
/// during an edit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Freshness thresholds are not strictly increasing.
    #[error("freshness thresholds for module {module} must satisfy amber < red (amber = {amber}, red = {red})")]
    NonIncreasingThresholds {
        /// The offending module.
        module: String,
        /// Configured amber threshold in days.
        amber: u32,
        /// Configured red threshold in days.
        red: u32,
    },

    /// The same module was configured twice.
    #[error("duplicate freshness configuration for module {0}")]
    DuplicateModule(String),

    /// Two completeness checks share an id.
    #[error("duplicate completeness check id {0:?}")]
    DuplicateCheck(String),

    /// A completeness check is malformed.
    #[error("completeness check {id:?}: {reason}")]
    InvalidCheck {
        /// The check id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The same entity field was registered twice in the field catalog.
    #[error("field {entity_type}.{field} is registered more than once")]
    DuplicateField {
        /// Entity type of the duplicated field.
        entity_type: String,
        /// Field name.
        field: String,
    },

    /// The minimum justification length must be at least one character.
    #[error("min_justification_chars must be at least 1")]
    ZeroJustificationMinimum,

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}
