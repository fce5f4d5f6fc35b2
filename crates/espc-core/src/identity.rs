//! # Identity Newtypes
//!
//! Domain-primitive newtypes for the identifiers governance works with.
//! Each identifier is a distinct type: a [`ProjectId`] cannot be passed where
//! an [`ActorId`] is expected.
//!
//! Governed records are opaque to the engine. It addresses them only through
//! an [`EntityRef`], the `(entity type, entity id)` pair.
//!
//! ## Validation
//!
//! All identifiers are trimmed, must be non-empty, and are capped at
//! [`MAX_IDENTIFIER_LEN`] characters. Deserialization routes through the same
//! constructor, so an invalid identifier in a configuration or scenario file
//! is rejected at load time.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length of any identifier, in characters.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Deserialize a string newtype through its validating `new()` constructor.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Define a validated, trimmed, non-empty string identifier.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $ty:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $ty(String);

        impl_validating_deserialize!($ty);

        impl $ty {
            /// Create a validated identifier.
            ///
            /// # Errors
            ///
            /// Returns a [`ValidationError`] if the trimmed value is empty or
            /// longer than [`MAX_IDENTIFIER_LEN`] characters.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                validate_identifier($kind, value.into()).map(Self)
            }

            /// Access the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

fn validate_identifier(kind: &'static str, raw: String) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    let len = trimmed.chars().count();
    if len > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::IdentifierTooLong {
            kind,
            max: MAX_IDENTIFIER_LEN,
            len,
        });
    }
    Ok(trimmed.to_string())
}

string_identifier!(
    /// The kind of a governed record (e.g. `asset`, `task`, `report`).
    EntityType,
    "entity type"
);

string_identifier!(
    /// The identifier of a governed record within its entity type.
    EntityId,
    "entity id"
);

string_identifier!(
    /// Identifier of an ESPC project; every governed record belongs to one.
    ProjectId,
    "project id"
);

string_identifier!(
    /// Identifier of an actor, supplied by the session provider.
    ActorId,
    "actor id"
);

/// Reference to a governed record: `(entity type, entity id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// The record's entity type.
    pub entity_type: EntityType,
    /// The record's id within that type.
    pub entity_id: EntityId,
}

impl EntityRef {
    /// Pair an entity type with an entity id.
    pub fn new(entity_type: EntityType, entity_id: EntityId) -> Self {
        Self {
            entity_type,
            entity_id,
        }
    }

    /// Build a reference from raw strings, validating both halves.
    pub fn parse(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            entity_type: EntityType::new(entity_type)?,
            entity_id: EntityId::new(entity_id)?,
        })
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}
