//! The upgrade orchestrator.
//!
//! [`Upgrader`] drives one run through its states:
//!
//! ```text
//! Unvalidated -> Validated -> Connected -> VersionLoaded -> Upgrading -> Completed
//!                                  \______________\______________\______-> Failed
//! ```
//!
//! Each pending step runs in its own transaction. Before a step starts, the
//! version row is overwritten with an in-progress marker and committed; the
//! real version is written when the step succeeds. A marker found at start-up
//! means a previous run died mid-step.

use crate::error::{UpgradeError, UpgradeResult};
use crate::plan::UpgradePlan;
use crate::step::SchemaSpec;
use crate::task::{ExternalTaskRegistry, TaskKind};
use chrono::{DateTime, Utc};
use dbu_core::{SchemaVersion, TypeMap};
use dbu_db::{Database, DuckDbBackend};
use serde::Serialize;

/// Text written between the from and to versions while a step runs.
pub const UPGRADE_IN_PROGRESS_MARKER: &str = " *** UPGRADE IN PROGRESS: migrating to version ";

const MARKER_PREFIX: &str = "*** UPGRADE IN PROGRESS";

/// Lifecycle of one upgrade run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeState {
    Unvalidated,
    Validated,
    Connected,
    VersionLoaded,
    Upgrading,
    Completed,
    Failed,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeReport {
    pub vendor: String,
    pub vendor_version: String,
    pub from_version: SchemaVersion,
    pub to_version: SchemaVersion,
    /// Steps executed, in order
    pub applied: Vec<SchemaVersion>,
    /// Declared steps outside the upgrade window
    pub skipped: Vec<SchemaVersion>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// What a run would do, computed without modifying the database.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradePreview {
    pub current_version: SchemaVersion,
    pub requested_version: SchemaVersion,
    pub target_version: SchemaVersion,
    pub pending: Vec<SchemaVersion>,
    /// Raw version row when it holds an in-progress marker
    pub interrupted: Option<String>,
}

struct Validated {
    target: SchemaVersion,
    type_map: TypeMap,
}

/// Validates a plan and applies it to a database.
pub struct Upgrader {
    plan: UpgradePlan,
    registry: ExternalTaskRegistry,
    state: UpgradeState,
    validated: Option<Validated>,
}

impl Upgrader {
    pub fn new(plan: UpgradePlan) -> Self {
        Self {
            plan,
            registry: ExternalTaskRegistry::new(),
            state: UpgradeState::Unvalidated,
            validated: None,
        }
    }

    pub fn with_registry(mut self, registry: ExternalTaskRegistry) -> Self {
        self.registry = registry;
        self.invalidate();
        self
    }

    pub fn registry_mut(&mut self) -> &mut ExternalTaskRegistry {
        self.invalidate();
        &mut self.registry
    }

    pub fn plan(&self) -> &UpgradePlan {
        &self.plan
    }

    pub fn state(&self) -> UpgradeState {
        self.state
    }

    fn invalidate(&mut self) {
        self.validated = None;
        self.state = UpgradeState::Unvalidated;
    }

    /// Check everything that can be checked before connecting.
    ///
    /// Requires a connection target and a target version, loads the type
    /// map, validates every step and task, and verifies that step versions
    /// are unique and declared in ascending order.
    pub fn validate(&mut self) -> UpgradeResult<()> {
        self.invalidate();
        let config = &self.plan.config;
        config.validate()?;

        let target = SchemaVersion::parse_optional(config.target_schema_version.as_deref())?;
        let type_map = TypeMap::load_or_builtin(self.plan.type_map_path().as_deref())?;

        for step in &self.plan.steps {
            step.validate()?;
            step.check_types(&type_map)?;
        }
        check_order(&self.plan.steps)?;
        self.check_external_tasks()?;

        log::debug!(
            "Validated upgrade plan: {} step(s), target {target}",
            self.plan.steps.len()
        );
        self.validated = Some(Validated { target, type_map });
        self.state = UpgradeState::Validated;
        Ok(())
    }

    fn check_external_tasks(&self) -> UpgradeResult<()> {
        for step in &self.plan.steps {
            for task in &step.tasks {
                if let TaskKind::External(external) = &task.kind {
                    let name = external.class_name.as_deref().unwrap_or_default();
                    if !self.registry.contains(name) {
                        return Err(UpgradeError::config(format!(
                            "step {}: no external task registered as '{}'",
                            step.version()?,
                            crate::task::external::qualify(name)
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn ensure_validated(&mut self) -> UpgradeResult<()> {
        if self.validated.is_none() {
            self.validate()?;
        }
        Ok(())
    }

    /// Validate, connect to the configured database and upgrade it.
    ///
    /// The connection is closed whatever the outcome.
    pub fn run(&mut self) -> UpgradeResult<UpgradeReport> {
        self.ensure_validated()?;
        let db = match DuckDbBackend::from_config(&self.plan.config.database) {
            Ok(db) => db,
            Err(e) => {
                self.state = UpgradeState::Failed;
                return Err(e.into());
            }
        };
        let result = self.run_on(&db);
        if let Err(e) = db.close() {
            log::warn!("Failed to close database connection: {e}");
        }
        result
    }

    /// Upgrade an already-open database.
    pub fn run_on(&mut self, db: &dyn Database) -> UpgradeResult<UpgradeReport> {
        self.ensure_validated()?;
        let result = self.upgrade(db);
        self.state = match &result {
            Ok(_) => UpgradeState::Completed,
            Err(_) => UpgradeState::Failed,
        };
        result
    }

    fn upgrade(&mut self, db: &dyn Database) -> UpgradeResult<UpgradeReport> {
        let started_at = Utc::now();
        self.state = UpgradeState::Connected;
        log::info!("Connected to {} {}", db.vendor(), db.vendor_version());

        let current = self.load_current_version(db)?;
        self.state = UpgradeState::VersionLoaded;

        let Some(validated) = self.validated.as_ref() else {
            return Err(UpgradeError::config("upgrade plan has not been validated"));
        };
        let requested = &validated.target;
        let target = resolve_target(&self.plan.steps, requested, &current)?;
        if target < current {
            return Err(UpgradeError::Downgrade {
                current: current.to_string(),
                target: target.to_string(),
            });
        }

        let pending = select_steps(&self.plan.steps, &current, &target)?;
        let mut skipped = Vec::new();
        for step in &self.plan.steps {
            let version = step.version()?;
            if !pending.iter().any(|p| std::ptr::eq(*p, step)) {
                skipped.push(version.clone());
            }
        }
        if pending.is_empty() {
            log::info!("Schema is at version {current}; nothing to upgrade");
        } else {
            log::info!(
                "Upgrading schema from {current} to {target}: {} step(s)",
                pending.len()
            );
        }

        self.state = UpgradeState::Upgrading;
        let mut applied = Vec::with_capacity(pending.len());
        let mut from = current.clone();
        for step in pending {
            from = self.apply_step(db, step, &from, &validated.type_map)?;
            applied.push(from.clone());
        }

        if requested.is_latest() {
            self.write_version(db, &target.to_string())?;
            db.commit()?;
        }

        log::info!("Schema upgrade complete: {current} -> {target}");
        Ok(UpgradeReport {
            vendor: db.vendor().to_string(),
            vendor_version: db.vendor_version().to_string(),
            from_version: current,
            to_version: target,
            applied,
            skipped,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn apply_step(
        &self,
        db: &dyn Database,
        step: &SchemaSpec,
        from: &SchemaVersion,
        type_map: &TypeMap,
    ) -> UpgradeResult<SchemaVersion> {
        let to = step.version()?.clone();
        log::info!("Upgrading schema from {from} to {to}");

        self.write_version(db, &format!("{from}{UPGRADE_IN_PROGRESS_MARKER}{to}"))?;
        db.commit()?;

        step.execute(db, type_map, &self.registry)?;

        self.write_version(db, &to.to_string())?;
        db.commit()?;
        Ok(to)
    }

    /// Read the single version row as raw text.
    fn read_version_row(&self, db: &dyn Database) -> UpgradeResult<Option<String>> {
        let table = &self.plan.config.version_table;
        let rows = db.query_strings(&table.select_sql(), &[&table.key_match])?;
        if rows.len() != 1 {
            return Err(UpgradeError::config(format!(
                "expected exactly one row in {} where {} = '{}', found {}",
                table.table,
                table.key_column,
                table.key_match,
                rows.len()
            )));
        }
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .flatten())
    }

    /// Read the current version, restoring the row if a previous run was
    /// interrupted.
    fn load_current_version(&self, db: &dyn Database) -> UpgradeResult<SchemaVersion> {
        let raw = self.read_version_row(db)?;
        if let Some((found, restored)) = raw.as_deref().and_then(split_marker) {
            log::warn!(
                "Found interrupted upgrade marker '{found}'; restoring schema version to {restored}"
            );
            self.write_version(db, restored)?;
            db.commit()?;
            return Err(UpgradeError::InconsistentState {
                found: found.to_string(),
                restored: restored.to_string(),
            });
        }

        let current = SchemaVersion::parse_optional(raw.as_deref())?;
        log::info!("Current schema version: {current}");
        Ok(current)
    }

    fn write_version(&self, db: &dyn Database, text: &str) -> UpgradeResult<()> {
        let table = &self.plan.config.version_table;
        let updated = db.execute_with_params(&table.update_sql(), &[text, &table.key_match])?;
        if updated != 1 {
            return Err(UpgradeError::NotFound {
                message: format!(
                    "version row {} = '{}' in {} (updated {updated} rows)",
                    table.key_column, table.key_match, table.table
                ),
            });
        }
        Ok(())
    }

    /// Compute what [`run_on`](Self::run_on) would do, without writing.
    pub fn preview(&mut self, db: &dyn Database) -> UpgradeResult<UpgradePreview> {
        self.ensure_validated()?;
        let raw = self.read_version_row(db)?;
        let (current_text, interrupted) = match raw.as_deref().and_then(split_marker) {
            Some((found, restored)) => (Some(restored.to_string()), Some(found.to_string())),
            None => (raw.clone(), None),
        };
        let current = SchemaVersion::parse_optional(current_text.as_deref())?;

        let Some(validated) = self.validated.as_ref() else {
            return Err(UpgradeError::config("upgrade plan has not been validated"));
        };
        let requested = validated.target.clone();
        let target = resolve_target(&self.plan.steps, &requested, &current)?;
        let pending = if target < current {
            Vec::new()
        } else {
            select_steps(&self.plan.steps, &current, &target)?
                .into_iter()
                .map(|s| s.version().cloned())
                .collect::<UpgradeResult<Vec<_>>>()?
        };

        Ok(UpgradePreview {
            current_version: current,
            requested_version: requested,
            target_version: target,
            pending,
            interrupted,
        })
    }
}

/// Split a version row holding an in-progress marker into the full text and
/// the version the interrupted step started from.
fn split_marker(raw: &str) -> Option<(&str, &str)> {
    let index = raw.find(MARKER_PREFIX)?;
    Some((raw, raw[..index].trim()))
}

/// Steps must be strictly ascending: no duplicates, declared in order.
fn check_order(steps: &[SchemaSpec]) -> UpgradeResult<()> {
    for pair in steps.windows(2) {
        let (prev, next) = (pair[0].version()?, pair[1].version()?);
        if prev == next {
            return Err(UpgradeError::config(format!(
                "schema version {next} is declared by more than one step"
            )));
        }
        if prev > next {
            return Err(UpgradeError::config(format!(
                "schema steps are out of order: {prev} is declared before {next}"
            )));
        }
    }
    Ok(())
}

/// `LATEST` resolves to the last declared step, or the current version when
/// there are no steps.
fn resolve_target(
    steps: &[SchemaSpec],
    requested: &SchemaVersion,
    current: &SchemaVersion,
) -> UpgradeResult<SchemaVersion> {
    if !requested.is_latest() {
        return Ok(requested.clone());
    }
    match steps.last() {
        Some(step) => Ok(step.version()?.clone()),
        None => Ok(current.clone()),
    }
}

/// Steps to run, in declaration order: the `LATEST` steps plus those in
/// `(current, target]`.
fn select_steps<'a>(
    steps: &'a [SchemaSpec],
    current: &SchemaVersion,
    target: &SchemaVersion,
) -> UpgradeResult<Vec<&'a SchemaSpec>> {
    let mut selected = Vec::new();
    for step in steps {
        let version = step.version()?;
        if version.is_latest() || version.is_between(current, target) {
            selected.push(step);
        }
    }
    Ok(selected)
}

#[cfg(test)]
#[path = "upgrader_test.rs"]
mod tests;
