//! Externally supplied upgrade logic.
//!
//! Some migrations cannot be expressed declaratively. Such code implements
//! [`DatabaseUpgradeTask`] and is registered with an
//! [`ExternalTaskRegistry`] under a qualified name; an `external` task in
//! the plan names it by `class`. Unqualified names resolve inside
//! [`DEFAULT_TASK_NAMESPACE`].

use super::{required, TaskAction, TaskContext};
use crate::error::{UpgradeError, UpgradeResult};
use dbu_core::TypeMap;
use dbu_db::{Database, DbResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Namespace applied to external task names without a `::` path.
pub const DEFAULT_TASK_NAMESPACE: &str = "dbupgrade::tasks";

/// Custom upgrade logic run inside a step's transaction.
pub trait DatabaseUpgradeTask {
    /// Apply the change. Must not commit; the step owns the transaction.
    fn execute(&mut self, type_map: &TypeMap, db: &dyn Database) -> DbResult<()>;
}

type TaskFactory = Box<dyn Fn() -> Box<dyn DatabaseUpgradeTask> + Send + Sync>;

/// Factories for external tasks, keyed by qualified name.
#[derive(Default)]
pub struct ExternalTaskRegistry {
    factories: BTreeMap<String, TaskFactory>,
}

impl ExternalTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; a fresh task instance is created per execution.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn DatabaseUpgradeTask> + Send + Sync + 'static,
    {
        let name = qualify(name);
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            log::warn!("External task {name} registered twice; keeping the latest");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&qualify(name))
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn DatabaseUpgradeTask>> {
        self.factories.get(&qualify(name)).map(|factory| factory())
    }

    /// Registered qualified names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for ExternalTaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTaskRegistry")
            .field("tasks", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Prefix unqualified names with [`DEFAULT_TASK_NAMESPACE`].
pub fn qualify(name: &str) -> String {
    let name = name.trim();
    if name.contains("::") {
        name.to_string()
    } else {
        format!("{DEFAULT_TASK_NAMESPACE}::{name}")
    }
}

/// Run a registered [`DatabaseUpgradeTask`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExternalTask {
    #[serde(rename = "class")]
    pub class_name: Option<String>,
}

impl TaskAction for ExternalTask {
    fn validate(&self) -> UpgradeResult<()> {
        required("external", "class", &self.class_name)?;
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let name = qualify(required("external", "class", &self.class_name)?);
        let mut task = ctx.registry.create(&name).ok_or_else(|| {
            UpgradeError::config(format!("no external task registered as '{name}'"))
        })?;

        log::info!("Running external task {name}");
        task.execute(ctx.type_map, ctx.db)
            .map_err(|e| UpgradeError::execution(&name, e))
    }
}
