//! # espc-governance: Data Governance Engine
//!
//! Controls who may change project data, when that data is frozen, how every
//! change is justified and recorded, and how healthy a project's data is.
//!
//! ## Components
//!
//! - **Permission Authority** (`permission`): pure predicates over role and
//!   ownership.
//!
//! - **Lock Registry** (`lock`): lock records and an explicit precedence
//!   table. The most restrictive blocking lock governs.
//!
//! - **Edit Transaction** (`edit`): `Viewing → Proposing → Justifying →
//!   Committed`, with typed rejections. Side effects happen only at commit.
//!
//! - **Audit Trail** (`audit`): append-only, sequenced, one entry per
//!   committed mutation.
//!
//! - **Freshness Evaluator** (`freshness`) and **Completeness Scorer**
//!   (`completeness`): read-only projections, recomputed on every call.
//!
//! The [`GovernanceEngine`] ties these together over an injected
//! [`GovernanceStore`]; [`InMemoryStore`] is the shipped store.

pub mod audit;
pub mod completeness;
pub mod config;
pub mod edit;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod lock;
pub mod permission;
pub mod store;

// Re-export primary types.
pub use audit::{AuditAction, AuditEntry, AuditTrail};
pub use completeness::{CheckSet, CompletenessCheck, CompletenessReport, RecordCounts, RecordMetric};
pub use config::{FieldCatalog, FieldGroup, GovernanceConfig};
pub use edit::{EditOutcome, EditState, EditTransaction, RejectionCause, ValueRule};
pub use engine::{Affordance, GovernanceEngine, LockOutcome};
pub use error::GovernanceError;
pub use freshness::{FreshnessConfig, FreshnessReading, FreshnessStatus, FreshnessTable};
pub use lock::{LockId, LockPolicy, LockRecord, LockType};
pub use permission::{allowed_actions, Permission};
pub use store::{GovernanceStore, InMemoryStore, Record, RecordHeader, StoreError};
