//! Table and sequence tasks.

use super::{required, TaskAction, TaskContext};
use crate::error::{UpgradeError, UpgradeResult};
use crate::serde_helpers::opt_string_or_number;
use dbu_db::DbError;
use serde::Deserialize;

/// Drop a table if it exists.
///
/// Existence is checked through an independent connection so the probe's
/// failure modes cannot disturb the step's transaction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DropTable {
    pub table: Option<String>,
}

impl TaskAction for DropTable {
    fn validate(&self) -> UpgradeResult<()> {
        required("drop_table", "table", &self.table)?;
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let table = required("drop_table", "table", &self.table)?;
        let exec = |e: DbError| UpgradeError::execution("drop_table", e);

        let probe = ctx.db.open_independent().map_err(exec)?;
        let exists = probe.table_exists(table);
        if let Err(e) = probe.close() {
            log::warn!("Failed to close table probe connection: {e}");
        }

        if !exists.map_err(exec)? {
            log::info!("Table {table} does not exist; nothing to drop");
            return Ok(());
        }
        log::info!("Dropping table {table}");
        ctx.db.drop_table(table).map_err(exec)
    }
}

/// Create a sequence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateSequence {
    pub name: Option<String>,
    /// Start value, default 1
    #[serde(deserialize_with = "opt_string_or_number")]
    pub initial: Option<String>,
    /// Step between values, default 1
    #[serde(deserialize_with = "opt_string_or_number")]
    pub increment: Option<String>,
}

impl CreateSequence {
    fn numbers(&self) -> UpgradeResult<(i64, i64)> {
        Ok((
            parse_number("initial", self.initial.as_deref())?,
            parse_number("increment", self.increment.as_deref())?,
        ))
    }
}

fn parse_number(field: &str, value: Option<&str>) -> UpgradeResult<i64> {
    let Some(text) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(1);
    };
    text.parse().map_err(|_| {
        UpgradeError::config(format!(
            "create_sequence '{field}' must be an integer, got '{text}'"
        ))
    })
}

impl TaskAction for CreateSequence {
    fn validate(&self) -> UpgradeResult<()> {
        required("create_sequence", "name", &self.name)?;
        self.numbers()?;
        Ok(())
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> UpgradeResult<()> {
        let name = required("create_sequence", "name", &self.name)?;
        let (initial, increment) = self.numbers()?;

        log::info!("Creating sequence {name} (start {initial}, increment {increment})");
        ctx.db
            .create_sequence(name, initial, increment)
            .map_err(|e| UpgradeError::execution("create_sequence", e))
    }
}
