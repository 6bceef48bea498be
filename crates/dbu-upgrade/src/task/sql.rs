//! Raw SQL statements with per-statement vendor targeting.

use super::{TaskAction, TaskContext, VendorTarget};
use crate::error::{UpgradeError, UpgradeResult};
use serde::Deserialize;

/// Run a list of raw statements in order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectSql {
    pub statements: Vec<SqlStatement>,
}

/// One raw statement, optionally restricted to a vendor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SqlStatement {
    #[serde(flatten)]
    pub target: VendorTarget,

    #[serde(default)]
    pub sql: Option<String>,

    /// Logged before the statement runs
    #[serde(default)]
    pub desc: Option<String>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            ..Default::default()
        }
    }
}

impl TaskAction for DirectSql {
    fn validate(&self) -> UpgradeResult<()> {
        if self.statements.is_empty() {
            return Err(UpgradeError::config(
                "direct_sql task requires at least one statement",
            ));
        }
        for statement in &self.statements {
            statement.target.validate()?;
        }
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        for statement in &self.statements {
            if !statement.target.is_targeted(ctx.db)? {
                continue;
            }
            let sql = match statement.sql.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => s,
                _ => {
                    log::debug!("Skipping empty direct_sql statement");
                    continue;
                }
            };
            match statement.desc.as_deref() {
                Some(desc) => log::info!("{desc}"),
                None => log::debug!("Executing: {sql}"),
            }
            ctx.db
                .execute(sql)
                .map_err(|e| UpgradeError::execution("direct_sql", e))?;
        }
        Ok(())
    }
}
