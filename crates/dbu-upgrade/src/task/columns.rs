//! Column-level tasks: add, alter, delete and raw modify.

use super::{check_generic_type, require_column, required, TaskAction, TaskContext};
use crate::error::{UpgradeError, UpgradeResult};
use crate::serde_helpers::opt_string_or_number;
use dbu_core::TypeMap;
use dbu_db::{ColumnChange, DbError};
use serde::Deserialize;

/// Add a column of a generic type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddColumn {
    pub table: Option<String>,
    pub column: Option<String>,
    /// Generic type token, mapped through the type map
    pub column_type: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub precision: Option<String>,
}

impl TaskAction for AddColumn {
    fn validate(&self) -> UpgradeResult<()> {
        required("add_column", "table", &self.table)?;
        required("add_column", "column", &self.column)?;
        required("add_column", "column_type", &self.column_type)?;
        Ok(())
    }

    fn check_types(&self, type_map: &TypeMap) -> UpgradeResult<()> {
        check_generic_type(type_map, self.column_type.as_deref())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let table = required("add_column", "table", &self.table)?;
        let column = required("add_column", "column", &self.column)?;
        let generic = required("add_column", "column_type", &self.column_type)?;
        let sql_type = ctx.type_map.sql_type(generic, ctx.db.vendor())?;

        log::info!("Adding column {table}.{column} ({sql_type})");
        ctx.db
            .add_column(table, column, sql_type, self.precision.as_deref())
            .map_err(|e| UpgradeError::execution("add_column", e))
    }
}

/// Change the type, default or nullability of an existing column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlterColumn {
    pub table: Option<String>,
    pub column: Option<String>,
    pub column_type: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub precision: Option<String>,
    #[serde(rename = "default", deserialize_with = "opt_string_or_number")]
    pub default_value: Option<String>,
    pub nullable: Option<bool>,
    /// Rebuild the table's indexes afterwards
    pub reindex: bool,
}

impl TaskAction for AlterColumn {
    fn validate(&self) -> UpgradeResult<()> {
        required("alter_column", "table", &self.table)?;
        required("alter_column", "column", &self.column)?;
        if self.column_type.is_none() && self.default_value.is_none() && self.nullable.is_none()
        {
            return Err(UpgradeError::config(
                "alter_column task requires at least one of 'column_type', 'default' or 'nullable'",
            ));
        }
        Ok(())
    }

    fn check_types(&self, type_map: &TypeMap) -> UpgradeResult<()> {
        check_generic_type(type_map, self.column_type.as_deref())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let table = required("alter_column", "table", &self.table)?;
        let column = required("alter_column", "column", &self.column)?;
        require_column("alter_column", ctx.db, table, column)?;

        let sql_type = match self.column_type.as_deref() {
            Some(generic) => Some(ctx.type_map.sql_type(generic, ctx.db.vendor())?.to_string()),
            None => None,
        };
        let change = ColumnChange {
            sql_type,
            precision: self.precision.clone(),
            default_value: self.default_value.clone(),
            nullable: self.nullable,
            reindex: self.reindex,
        };

        log::info!("Altering column {table}.{column}");
        ctx.db
            .alter_column(table, column, &change)
            .map_err(|e| UpgradeError::execution("alter_column", e))
    }
}

/// Drop a column if it is present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeleteColumn {
    pub table: Option<String>,
    pub column: Option<String>,
}

impl TaskAction for DeleteColumn {
    fn validate(&self) -> UpgradeResult<()> {
        required("delete_column", "table", &self.table)?;
        required("delete_column", "column", &self.column)?;
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let table = required("delete_column", "table", &self.table)?;
        let column = required("delete_column", "column", &self.column)?;
        let exec = |e: DbError| UpgradeError::execution("delete_column", e);

        if !ctx.db.column_exists(table, column).map_err(exec)? {
            log::info!("Column {table}.{column} does not exist; nothing to delete");
            return Ok(());
        }
        log::info!("Deleting column {table}.{column}");
        ctx.db.delete_column(table, column).map_err(exec)
    }
}

/// Modify an existing column with a raw vendor clause.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModifyColumn {
    pub table: Option<String>,
    pub column: Option<String>,
    /// Clause appended after the column name, e.g. `VARCHAR(4000)`
    pub modify: Option<String>,
}

impl TaskAction for ModifyColumn {
    fn validate(&self) -> UpgradeResult<()> {
        required("column_modify", "table", &self.table)?;
        required("column_modify", "column", &self.column)?;
        required("column_modify", "modify", &self.modify)?;
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let table = required("column_modify", "table", &self.table)?;
        let column = required("column_modify", "column", &self.column)?;
        let clause = required("column_modify", "modify", &self.modify)?;
        require_column("column_modify", ctx.db, table, column)?;

        log::info!("Modifying column {table}.{column}: {clause}");
        ctx.db
            .modify_column(table, column, clause)
            .map_err(|e| UpgradeError::execution("column_modify", e))
    }
}
