//! # espc-core: Foundational Types for the ESPC Governance Stack
//!
//! This crate is the leaf of the workspace DAG. It defines the primitives
//! every other crate speaks in: identifiers, roles, data modules, project
//! phases, and time.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `EntityType`, `EntityId`,
//!    `ProjectId`, `ActorId` are validated newtypes. An `EntityRef` pairs a
//!    type with an id and is the only way governance addresses a record.
//!
//! 2. **Closed enums for configuration vocabularies.** `DataModule` and
//!    `ProjectPhase` are exhaustive enums with `snake_case` serde names, so an
//!    unknown module or phase in a configuration file fails at load time.
//!
//! 3. **UTC-only, seconds-precision timestamps.** `Timestamp` is the single
//!    time representation; `Clock` is the seam through which governance reads
//!    "now", so tests can drive time with `ManualClock`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `espc-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod actor;
pub mod error;
pub mod identity;
pub mod module;
pub mod phase;
pub mod temporal;

pub use actor::{Actor, Role};
pub use error::{ConfigError, EspcError, ValidationError};
pub use identity::{ActorId, EntityId, EntityRef, EntityType, ProjectId};
pub use module::DataModule;
pub use phase::ProjectPhase;
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
