//! # Replay Subcommand
//!
//! Seeds an in-memory store from a scenario file, runs its steps through the
//! governance engine on a manual clock, and reports every outcome followed by
//! the project's audit trail, freshness and completeness.
//!
//! ```yaml
//! start: 2026-01-05T09:00:00Z
//! project: espc-001
//! actors:
//!   - { id: eng-1, name: Sam Engineer, role: engineer }
//! records:
//!   - { entity_type: project, entity_id: espc-001, project_id: espc-001, fields: { phase: audit } }
//! steps:
//!   - actor: eng-1
//!     advance_days: 1
//!     edit: { entity_type: asset, entity_id: AHU-1, field: make, value: Carrier, reason: nameplate photo }
//!     expect: committed
//! ```
//!
//! A step whose outcome differs from its `expect` is a scenario failure
//! (exit 1).

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use espc_core::{
    Actor, ActorId, Clock, DataModule, EntityId, EntityRef, EntityType, ManualClock, ProjectId,
    Timestamp,
};
use espc_governance::{
    AuditEntry, CompletenessReport, EditOutcome, FreshnessReading, GovernanceConfig,
    GovernanceEngine, GovernanceStore, InMemoryStore, LockId, LockOutcome, LockRecord, LockType,
    Record,
};

/// Arguments for the `espc replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Path to the scenario YAML file.
    #[arg(value_name = "SCENARIO_YAML")]
    pub scenario: PathBuf,

    /// Governance configuration file. Defaults to the standard configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// A replayable scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Clock start.
    pub start: Timestamp,
    /// Project reported on after the steps run.
    pub project: ProjectId,
    /// Known actors.
    pub actors: Vec<Actor>,
    /// Records to seed.
    #[serde(default)]
    pub records: Vec<Record>,
    /// Locks already in force before the scenario starts. Not audited.
    #[serde(default)]
    pub locks: Vec<SeedLock>,
    /// Module timestamps already recorded before the scenario starts.
    #[serde(default)]
    pub module_timestamps: Vec<SeedTimestamp>,
    /// Steps to run, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A pre-existing lock.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedLock {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    #[serde(default)]
    pub field: Option<String>,
    pub lock_type: LockType,
    pub locked_by: String,
    pub locked_at: Timestamp,
    pub reason: String,
}

/// A pre-existing module timestamp for the scenario's project.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedTimestamp {
    pub module: DataModule,
    pub at: Timestamp,
}

/// One scenario step.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Acting user.
    pub actor: ActorId,
    /// Set the clock to this instant before running the step.
    #[serde(default)]
    pub at: Option<Timestamp>,
    /// Advance the clock by this many days before running the step.
    #[serde(default)]
    pub advance_days: Option<i64>,
    /// What to do.
    #[serde(flatten)]
    pub action: Action,
    /// Expected outcome label, e.g. `committed` or `lock_violation`.
    #[serde(default)]
    pub expect: Option<String>,
}

/// A step's operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Propose and justify a field edit.
    Edit {
        entity_type: EntityType,
        entity_id: EntityId,
        field: String,
        value: Value,
        reason: String,
    },
    /// Place a lock.
    Lock {
        entity_type: EntityType,
        entity_id: EntityId,
        #[serde(default)]
        field: Option<String>,
        lock_type: LockType,
        reason: String,
    },
    /// Release the earliest active lock of `lock_type` on the record.
    Unlock {
        entity_type: EntityType,
        entity_id: EntityId,
        lock_type: LockType,
        reason: String,
    },
}

impl Action {
    fn describe(&self) -> String {
        match self {
            Self::Edit {
                entity_type,
                entity_id,
                field,
                value,
                ..
            } => format!("edit {entity_type}:{entity_id}.{field} = {value}"),
            Self::Lock {
                entity_type,
                entity_id,
                field,
                lock_type,
                ..
            } => match field {
                Some(field) => format!("lock {lock_type} {entity_type}:{entity_id}.{field}"),
                None => format!("lock {lock_type} {entity_type}:{entity_id}"),
            },
            Self::Unlock {
                entity_type,
                entity_id,
                lock_type,
                ..
            } => format!("unlock {lock_type} {entity_type}:{entity_id}"),
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// 1-based step number.
    pub step: usize,
    /// Clock time the step ran at.
    pub at: Timestamp,
    /// Acting user.
    pub actor: ActorId,
    /// What the step did.
    pub action: String,
    /// Outcome label.
    pub outcome: String,
    /// Extra detail (rejection text, audit sequence).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Expected outcome label, when given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Whether the outcome matched the expectation (true when none given).
    pub matched: bool,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Per-step outcomes.
    pub steps: Vec<StepReport>,
    /// The project's audit trail, newest first.
    pub audit: Vec<AuditEntry>,
    /// Module freshness at the final clock time.
    pub freshness: Vec<FreshnessReading>,
    /// Project completeness, when the project has a phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<CompletenessReport>,
}

impl ReplayReport {
    /// Number of steps whose outcome did not match the expectation.
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.matched).count()
    }
}

/// Execute the replay subcommand.
pub fn run_replay(args: &ReplayArgs) -> Result<u8> {
    let config = crate::load_config(args.config.as_deref())?;
    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read scenario: {}", args.scenario.display()))?;
    let scenario: Scenario = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse scenario: {}", args.scenario.display()))?;

    let report = replay(&scenario, config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }

    let failures = report.failures();
    if failures > 0 {
        tracing::warn!(failures, "scenario expectations not met");
        return Ok(1);
    }
    Ok(0)
}

/// Run a scenario against a fresh in-memory store.
pub fn replay(scenario: &Scenario, config: GovernanceConfig) -> Result<ReplayReport> {
    let store = InMemoryStore::new();
    for record in &scenario.records {
        store
            .insert_record(record.clone())
            .with_context(|| format!("failed to seed record {}", record.entity))?;
    }
    for seed in &scenario.locks {
        store
            .seed_lock(LockRecord {
                id: LockId::new(),
                entity: EntityRef::new(seed.entity_type.clone(), seed.entity_id.clone()),
                field: seed.field.clone(),
                lock_type: seed.lock_type,
                locked_by: seed.locked_by.clone(),
                locked_at: seed.locked_at,
                reason: seed.reason.clone(),
            })
            .context("failed to seed lock")?;
    }
    for seed in &scenario.module_timestamps {
        store.seed_module_timestamp(scenario.project.clone(), seed.module, seed.at);
    }

    let actors: BTreeMap<&ActorId, &Actor> = scenario.actors.iter().map(|a| (&a.id, a)).collect();
    let clock = ManualClock::new(scenario.start);
    let engine = GovernanceEngine::new(store, config, clock.clone())?;

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (i, step) in scenario.steps.iter().enumerate() {
        if let Some(at) = step.at {
            clock.set(at);
        }
        if let Some(days) = step.advance_days {
            clock.advance_days(days);
        }
        let Some(actor) = actors.get(&step.actor) else {
            bail!("step {}: unknown actor {}", i + 1, step.actor);
        };
        let (outcome, detail) = run_step(&engine, actor, &step.action)
            .with_context(|| format!("step {} failed: {}", i + 1, step.action.describe()))?;
        let matched = step.expect.as_deref().map_or(true, |e| e == outcome);
        tracing::debug!(step = i + 1, %outcome, matched, "step replayed");
        steps.push(StepReport {
            step: i + 1,
            at: clock.now(),
            actor: step.actor.clone(),
            action: step.action.describe(),
            outcome,
            detail,
            expected: step.expect.clone(),
            matched,
        });
    }

    let completeness = match engine.completeness(&scenario.project) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(project = %scenario.project, error = %e, "completeness unavailable");
            None
        }
    };
    Ok(ReplayReport {
        steps,
        audit: engine.project_audit(&scenario.project),
        freshness: engine.freshness_report(&scenario.project),
        completeness,
    })
}

type Engine = GovernanceEngine<InMemoryStore, ManualClock>;

fn run_step(engine: &Engine, actor: &Actor, action: &Action) -> Result<(String, Option<String>)> {
    match action {
        Action::Edit {
            entity_type,
            entity_id,
            field,
            value,
            reason,
        } => {
            let entity = EntityRef::new(entity_type.clone(), entity_id.clone());
            let outcome = engine.edit(actor, &entity, field, value.clone(), reason)?;
            Ok(match outcome {
                EditOutcome::Committed { entry } => {
                    ("committed".into(), Some(format!("audit #{}", entry.sequence)))
                }
                EditOutcome::NoChange => ("no_change".into(), None),
                EditOutcome::Rejected { cause } => (cause.as_str().into(), Some(cause.to_string())),
            })
        }
        Action::Lock {
            entity_type,
            entity_id,
            field,
            lock_type,
            reason,
        } => {
            let entity = EntityRef::new(entity_type.clone(), entity_id.clone());
            let outcome =
                engine.place_lock(actor, &entity, field.as_deref(), *lock_type, reason)?;
            Ok(lock_outcome(outcome))
        }
        Action::Unlock {
            entity_type,
            entity_id,
            lock_type,
            reason,
        } => {
            let entity = EntityRef::new(entity_type.clone(), entity_id.clone());
            let target = engine
                .store()
                .locks_for(&entity)
                .into_iter()
                .filter(|l| l.lock_type == *lock_type)
                .min_by(|a, b| a.locked_at.cmp(&b.locked_at));
            let Some(target) = target else {
                bail!("no active {lock_type} lock on {entity}");
            };
            let outcome = engine.release_lock(actor, &entity, target.id, reason)?;
            Ok(lock_outcome(outcome))
        }
    }
}

fn lock_outcome(outcome: LockOutcome) -> (String, Option<String>) {
    match outcome {
        LockOutcome::Placed { entry, .. } => ("placed".into(), Some(format!("audit #{}", entry.sequence))),
        LockOutcome::Released { entry, .. } => {
            ("released".into(), Some(format!("audit #{}", entry.sequence)))
        }
        LockOutcome::Rejected { cause } => (cause.as_str().into(), Some(cause.to_string())),
    }
}

/// Human-readable rendering of a replay.
pub fn render(report: &ReplayReport) -> String {
    let mut out = String::from("Steps:\n");
    for s in &report.steps {
        let mark = if s.matched { " " } else { "!" };
        out.push_str(&format!(
            "{mark} [{}] {} {} {} -> {}",
            s.step, s.at, s.actor, s.action, s.outcome
        ));
        if let Some(detail) = &s.detail {
            out.push_str(&format!(" ({detail})"));
        }
        if !s.matched {
            if let Some(expected) = &s.expected {
                out.push_str(&format!(" [expected {expected}]"));
            }
        }
        out.push('\n');
    }

    out.push_str("\nAudit trail (newest first):\n");
    for e in &report.audit {
        out.push_str(&format!(
            "  #{} {} {} {}:{}.{} {} -> {} \"{}\"\n",
            e.sequence, e.timestamp, e.user_name, e.entity.entity_type, e.entity.entity_id,
            e.field, e.old_value, e.new_value, e.reason
        ));
    }

    out.push_str("\nFreshness:\n");
    for r in &report.freshness {
        out.push_str(&format!("  {}\n", crate::freshness::render(r)));
    }

    if let Some(c) = &report.completeness {
        out.push_str("\nCompleteness:\n");
        for line in crate::completeness::render(c).lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    out
}
