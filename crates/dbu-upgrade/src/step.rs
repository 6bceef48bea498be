//! Versioned upgrade steps.

use crate::error::{UpgradeError, UpgradeResult};
use crate::serde_helpers::opt_string_or_number;
use crate::task::{ExternalTaskRegistry, Task, TaskContext};
use dbu_core::{SchemaVersion, TypeMap};
use dbu_db::Database;
use serde::Deserialize;
use std::cell::OnceCell;
use std::cmp::Ordering;

/// The tasks that move the schema to one version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaSpec {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    version: Option<String>,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(skip)]
    parsed: OnceCell<SchemaVersion>,
}

impl SchemaSpec {
    pub fn new(version: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            version: Some(version.into()),
            tasks,
            parsed: OnceCell::new(),
        }
    }

    /// The version text as declared.
    pub fn declared_version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The parsed version, computed once.
    pub fn version(&self) -> UpgradeResult<&SchemaVersion> {
        if let Some(parsed) = self.parsed.get() {
            return Ok(parsed);
        }
        let text = match self.version.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(UpgradeError::config("schema step declares no version")),
        };
        let parsed = SchemaVersion::parse(text).map_err(|e| {
            UpgradeError::config(format!("schema step version '{text}' is invalid: {e}"))
        })?;
        Ok(self.parsed.get_or_init(|| parsed))
    }

    /// Check the version and every task's settings.
    pub fn validate(&self) -> UpgradeResult<()> {
        self.check_tasks(Task::validate)
    }

    /// Check every task's generic column types against `type_map`.
    pub fn check_types(&self, type_map: &TypeMap) -> UpgradeResult<()> {
        self.check_tasks(|task| task.check_types(type_map))
    }

    fn check_tasks(&self, check: impl Fn(&Task) -> UpgradeResult<()>) -> UpgradeResult<()> {
        let version = self.version()?;
        for (index, task) in self.tasks.iter().enumerate() {
            check(task).map_err(|e| {
                UpgradeError::config(format!(
                    "step {version}, task #{} ({}): {e}",
                    index + 1,
                    task.name()
                ))
            })?;
        }
        Ok(())
    }

    /// Order by parsed version.
    pub fn compare(&self, other: &SchemaSpec) -> UpgradeResult<Ordering> {
        Ok(self.version()?.cmp(other.version()?))
    }

    /// Run every targeted task on `db`.
    ///
    /// Tasks that tolerate failure run after a commit so that rolling back
    /// discards only their own work. Any other failure rolls back the step
    /// and is returned. The caller commits on success.
    pub fn execute(
        &self,
        db: &dyn Database,
        type_map: &TypeMap,
        registry: &ExternalTaskRegistry,
    ) -> UpgradeResult<()> {
        let version = self.version()?;

        for (index, task) in self.tasks.iter().enumerate() {
            let wrap = |source: UpgradeError| UpgradeError::StepExecution {
                version: version.to_string(),
                task: task.name().to_string(),
                source: Box::new(source),
            };

            if !task.is_targeted(db).map_err(wrap)? {
                continue;
            }
            if task.needs_isolation() {
                db.commit().map_err(|e| wrap(e.into()))?;
            }

            log::debug!("Step {version}: task #{} ({})", index + 1, task.name());
            let ctx = TaskContext {
                db,
                type_map,
                registry,
                ignore_error: task.ignore_error,
            };
            match task.execute(&ctx) {
                Ok(()) => {}
                Err(e) if task.ignore_error => {
                    log::warn!(
                        "Ignoring failure of task #{} ({}) in step {version}: {e}",
                        index + 1,
                        task.name()
                    );
                    db.rollback().map_err(|e| wrap(e.into()))?;
                }
                Err(e) => {
                    if let Err(rollback) = db.rollback() {
                        log::warn!("Rollback after failed task also failed: {rollback}");
                    }
                    return Err(wrap(e));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "step_test.rs"]
mod tests;
