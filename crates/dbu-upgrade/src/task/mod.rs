//! Upgrade tasks.
//!
//! A [`Task`] is one unit of schema or data change inside a step. Every task
//! shares the vendor targeting fields and the `ignore_error` flag; the
//! `kind` field selects the variant and its own settings:
//!
//! ```yaml
//! - kind: add_column
//!   table: rhq_alert
//!   column: recovery_id
//!   column_type: INTEGER
//! - kind: direct_sql
//!   target_vendor: postgresql
//!   ignore_error: true
//!   statements:
//!     - sql: CREATE INDEX rhq_alert_idx ON rhq_alert (alert_time)
//! ```

pub mod columns;
pub mod external;
pub mod foreign_keys;
pub mod rows;
pub mod sql;
pub mod table;

use crate::error::{UpgradeError, UpgradeResult};
use dbu_core::TypeMap;
use dbu_db::Database;
use serde::Deserialize;

pub use columns::{AddColumn, AlterColumn, DeleteColumn, ModifyColumn};
pub use external::{ExternalTask, ExternalTaskRegistry};
pub use foreign_keys::DropForeignKeys;
pub use rows::{InsertRow, UpdateColumn};
pub use sql::{DirectSql, SqlStatement};
pub use table::{CreateSequence, DropTable};

/// Everything a task may touch while it runs.
pub struct TaskContext<'a> {
    pub db: &'a dyn Database,
    pub type_map: &'a TypeMap,
    pub registry: &'a ExternalTaskRegistry,
    /// The owning task's `ignore_error` flag
    pub ignore_error: bool,
}

/// Validation and execution shared by every task variant.
pub(crate) trait TaskAction {
    /// Check required settings without touching the database.
    fn validate(&self) -> UpgradeResult<()>;

    /// Check generic column types against the loaded type map.
    fn check_types(&self, _type_map: &TypeMap) -> UpgradeResult<()> {
        Ok(())
    }

    /// Perform the change on the context's connection. Must not commit.
    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()>;
}

/// Restricts a task or statement to one vendor and optionally one vendor version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VendorTarget {
    #[serde(default)]
    pub target_vendor: Option<String>,

    #[serde(default)]
    pub target_version: Option<String>,
}

impl VendorTarget {
    pub fn vendor(vendor: impl Into<String>) -> Self {
        Self {
            target_vendor: Some(vendor.into()),
            target_version: None,
        }
    }

    /// A version without a vendor cannot be interpreted.
    pub fn validate(&self) -> UpgradeResult<()> {
        if self.target_version.is_some() && self.target_vendor.is_none() {
            return Err(UpgradeError::config(format!(
                "target_version '{}' requires a target_vendor",
                self.target_version.as_deref().unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Whether the connected database is selected by this target.
    pub fn is_targeted(&self, db: &dyn Database) -> UpgradeResult<bool> {
        self.validate()?;
        let targeted = db.matches(
            self.target_vendor.as_deref(),
            self.target_version.as_deref(),
        );
        if !targeted {
            log::debug!(
                "Skipping: targeted at {} {} but connected to {} {}",
                self.target_vendor.as_deref().unwrap_or("*"),
                self.target_version.as_deref().unwrap_or("*"),
                db.vendor(),
                db.vendor_version()
            );
        }
        Ok(targeted)
    }
}

/// The task variants, selected by the `kind` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    AddColumn(AddColumn),
    AlterColumn(AlterColumn),
    DeleteColumn(DeleteColumn),
    DropTable(DropTable),
    CreateSequence(CreateSequence),
    DirectSql(DirectSql),
    Insert(InsertRow),
    Update(UpdateColumn),
    ColumnModify(ModifyColumn),
    DropForeignKeys(DropForeignKeys),
    External(ExternalTask),
}

impl TaskKind {
    /// The `kind` tag of this variant.
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::AddColumn(_) => "add_column",
            TaskKind::AlterColumn(_) => "alter_column",
            TaskKind::DeleteColumn(_) => "delete_column",
            TaskKind::DropTable(_) => "drop_table",
            TaskKind::CreateSequence(_) => "create_sequence",
            TaskKind::DirectSql(_) => "direct_sql",
            TaskKind::Insert(_) => "insert",
            TaskKind::Update(_) => "update",
            TaskKind::ColumnModify(_) => "column_modify",
            TaskKind::DropForeignKeys(_) => "drop_foreign_keys",
            TaskKind::External(_) => "external",
        }
    }

    fn action(&self) -> &dyn TaskAction {
        match self {
            TaskKind::AddColumn(t) => t,
            TaskKind::AlterColumn(t) => t,
            TaskKind::DeleteColumn(t) => t,
            TaskKind::DropTable(t) => t,
            TaskKind::CreateSequence(t) => t,
            TaskKind::DirectSql(t) => t,
            TaskKind::Insert(t) => t,
            TaskKind::Update(t) => t,
            TaskKind::ColumnModify(t) => t,
            TaskKind::DropForeignKeys(t) => t,
            TaskKind::External(t) => t,
        }
    }
}

/// One declared unit of change within a step.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub target: VendorTarget,

    /// Log and roll back a failure instead of aborting the step
    #[serde(default)]
    pub ignore_error: bool,

    #[serde(flatten)]
    pub kind: TaskKind,
}

impl Task {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            target: VendorTarget::default(),
            ignore_error: false,
            kind,
        }
    }

    pub fn ignoring_errors(mut self) -> Self {
        self.ignore_error = true;
        self
    }

    pub fn targeting(mut self, target: VendorTarget) -> Self {
        self.target = target;
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Check the task's settings before any connection is opened.
    pub fn validate(&self) -> UpgradeResult<()> {
        self.target.validate()?;
        self.kind.action().validate()
    }

    /// Reject generic column types the type map does not know.
    pub fn check_types(&self, type_map: &TypeMap) -> UpgradeResult<()> {
        self.kind.action().check_types(type_map)
    }

    /// Whether this task applies to the connected database.
    pub fn is_targeted(&self, db: &dyn Database) -> UpgradeResult<bool> {
        self.target.is_targeted(db)
    }

    /// Tasks whose failure is tolerated run in their own transaction, so a
    /// rollback discards only their work.
    pub fn needs_isolation(&self) -> bool {
        self.ignore_error || matches!(&self.kind, TaskKind::Insert(insert) if !insert.dup_fail)
    }

    pub fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        self.kind.action().execute(ctx)
    }
}

/// Fail when `generic` is set but has no type map entry.
pub(crate) fn check_generic_type(type_map: &TypeMap, generic: Option<&str>) -> UpgradeResult<()> {
    if let Some(generic) = generic {
        type_map.value_kind(generic)?;
    }
    Ok(())
}

/// Fetch a required text setting, rejecting absent or blank values.
pub(crate) fn required<'a>(
    task: &str,
    field: &str,
    value: &'a Option<String>,
) -> UpgradeResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(UpgradeError::config(format!(
            "{task} task requires '{field}'"
        ))),
    }
}

/// Fail with `NotFound` unless `table.column` exists.
pub(crate) fn require_column(
    task: &str,
    db: &dyn Database,
    table: &str,
    column: &str,
) -> UpgradeResult<()> {
    let exists = db
        .column_exists(table, column)
        .map_err(|e| UpgradeError::execution(task, e))?;
    if exists {
        Ok(())
    } else {
        Err(UpgradeError::NotFound {
            message: format!("column {table}.{column} does not exist"),
        })
    }
}

#[cfg(test)]
#[path = "task_test.rs"]
mod tests;
