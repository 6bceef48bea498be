//! Row-level data tasks.

use super::{check_generic_type, require_column, required, TaskAction, TaskContext};
use crate::error::{UpgradeError, UpgradeResult};
use crate::serde_helpers::opt_string_or_number;
use dbu_core::TypeMap;
use dbu_db::SqlValue;
use serde::Deserialize;

/// Generic type used to bind update values when none is declared.
pub const DEFAULT_UPDATE_TYPE: &str = "VARCHAR2";

/// Insert rows using the clause that follows `INSERT INTO <table>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsertRow {
    pub table: Option<String>,
    /// e.g. `(id, name) VALUES (1, 'x')` or `SELECT ... FROM ...`
    pub values: Option<String>,
    /// When false a duplicate-row failure is treated as already applied
    pub dup_fail: bool,
}

impl Default for InsertRow {
    fn default() -> Self {
        Self {
            table: None,
            values: None,
            dup_fail: true,
        }
    }
}

impl TaskAction for InsertRow {
    fn validate(&self) -> UpgradeResult<()> {
        required("insert", "table", &self.table)?;
        required("insert", "values", &self.values)?;
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let table = required("insert", "table", &self.table)?;
        let values = required("insert", "values", &self.values)?;

        match ctx.db.insert(table, values) {
            Ok(rows) => {
                log::info!("Inserted {rows} row(s) into {table}");
                Ok(())
            }
            Err(e) if e.is_constraint_violation() && self.dup_fail => {
                Err(UpgradeError::Duplicate {
                    table: table.to_string(),
                    cause: e,
                })
            }
            Err(e) if e.is_constraint_violation() => {
                log::info!("Row already present in {table}; treating insert as applied");
                ctx.db
                    .rollback()
                    .map_err(|e| UpgradeError::execution("insert", e))
            }
            Err(e) => Err(UpgradeError::execution("insert", e)),
        }
    }
}

/// Set one column to a typed value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateColumn {
    pub table: Option<String>,
    pub column: Option<String>,
    /// Text form of the new value; absent means NULL
    #[serde(deserialize_with = "opt_string_or_number")]
    pub value: Option<String>,
    /// Row filter; absent updates every row
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    /// Generic type used to bind `value`
    pub column_type: Option<String>,
}

impl UpdateColumn {
    fn generic_type(&self) -> &str {
        self.column_type.as_deref().unwrap_or(DEFAULT_UPDATE_TYPE)
    }
}

impl TaskAction for UpdateColumn {
    fn validate(&self) -> UpgradeResult<()> {
        required("update", "table", &self.table)?;
        required("update", "column", &self.column)?;
        Ok(())
    }

    fn check_types(&self, type_map: &TypeMap) -> UpgradeResult<()> {
        check_generic_type(type_map, Some(self.generic_type()))
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let table = required("update", "table", &self.table)?;
        let column = required("update", "column", &self.column)?;
        require_column("update", ctx.db, table, column)?;

        let kind = ctx.type_map.value_kind(self.generic_type())?;
        let value = SqlValue::coerce(self.value.as_deref(), kind)
            .map_err(|e| UpgradeError::execution("update", e))?;
        let where_clause = self
            .where_clause
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty());

        let rows = ctx
            .db
            .update_column(table, column, where_clause, &value)
            .map_err(|e| UpgradeError::execution("update", e))?;
        log::info!("Updated {rows} row(s) of {table}.{column}");
        Ok(())
    }
}
