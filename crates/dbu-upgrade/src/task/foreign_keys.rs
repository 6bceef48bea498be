//! Dropping foreign keys that reference a column.

use super::{required, TaskAction, TaskContext};
use crate::error::{UpgradeError, UpgradeResult};
use dbu_db::DbError;
use serde::Deserialize;

/// Drop every foreign key constraint on `table.column`.
///
/// Only vendors with a catalog query (PostgreSQL, Oracle) are supported.
/// With `ignore_error`, a failed drop does not stop the remaining drops, but
/// the task still fails afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DropForeignKeys {
    pub table: Option<String>,
    pub column: Option<String>,
}

impl TaskAction for DropForeignKeys {
    fn validate(&self) -> UpgradeResult<()> {
        required("drop_foreign_keys", "table", &self.table)?;
        required("drop_foreign_keys", "column", &self.column)?;
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let table = required("drop_foreign_keys", "table", &self.table)?;
        let column = required("drop_foreign_keys", "column", &self.column)?;
        let exec = |e: DbError| UpgradeError::execution("drop_foreign_keys", e);

        let Some(query) = ctx.db.foreign_key_query(table, column) else {
            if ctx.ignore_error {
                log::warn!(
                    "Foreign key lookup is not supported on {}; skipping {table}.{column}",
                    ctx.db.vendor()
                );
                return Ok(());
            }
            return Err(exec(DbError::NotImplemented {
                backend: ctx.db.vendor().to_string(),
                feature: "foreign key lookup".to_string(),
            }));
        };

        let constraints: Vec<String> = ctx
            .db
            .query_strings(&query, &[])
            .map_err(exec)?
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect();

        if constraints.is_empty() {
            log::info!("No foreign keys reference {table}.{column}");
        }
        let mut failed = Vec::new();
        for constraint in constraints {
            match ctx.db.drop_constraint(table, &constraint) {
                Ok(()) => log::info!("Dropped foreign key {constraint} on {table}.{column}"),
                Err(e) if ctx.ignore_error => {
                    log::warn!("Failed to drop foreign key {constraint} on {table}: {e}");
                    failed.push(constraint);
                }
                Err(e) => return Err(exec(e)),
            }
        }

        if !failed.is_empty() {
            return Err(exec(DbError::Custom(format!(
                "failed to drop foreign key(s) {} on {table}",
                failed.join(", ")
            ))));
        }
        Ok(())
    }
}
