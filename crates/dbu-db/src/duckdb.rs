//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{ColumnChange, Database};
use crate::value::SqlValue;
use dbu_core::DatabaseConfig;
use duckdb::Connection;
use std::cell::Cell;
use std::path::Path;

const VENDOR: &str = "duckdb";

/// DuckDB database backend
///
/// Single-threaded, no `Mutex` needed because an upgrade run is sequential.
pub struct DuckDbBackend {
    conn: Connection,
    version: String,
    in_transaction: Cell<bool>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Self::with_connection(conn)
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Open the connection target named in the configuration
    pub fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        let path = config
            .path
            .as_deref()
            .ok_or_else(|| DbError::ConnectionError("no connection target configured".into()))?;
        log::debug!("Opening {} database at {path}", config.db_type);
        if config.user.is_some() {
            log::debug!("DuckDB does not authenticate; ignoring configured user");
        }
        Self::new(path)
    }

    fn with_connection(conn: Connection) -> DbResult<Self> {
        let version: String = conn
            .query_row("SELECT version()", [], |row| row.get(0))
            .map_err(|e| DbError::ConnectionError(format!("failed to read version: {e}")))?;
        let backend = Self {
            conn,
            version,
            in_transaction: Cell::new(false),
        };
        backend.begin()?;
        log::debug!("Connected to database={VENDOR}, version={}", backend.version);
        Ok(backend)
    }

    fn begin(&self) -> DbResult<()> {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))?;
        self.in_transaction.set(true);
        Ok(())
    }

    fn end_transaction(&self, command: &str) -> DbResult<()> {
        if !self.in_transaction.get() {
            return self.begin();
        }
        let result = self.conn.execute_batch(command);
        self.in_transaction.set(false);
        if let Err(e) = result {
            if command != "ROLLBACK" {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    log::warn!("ROLLBACK after failed {command} also failed: {rollback}");
                }
            }
            self.begin()?;
            return Err(DbError::TransactionError(format!("{command} failed: {e}")));
        }
        self.begin()
    }

    fn split_qualified(name: &str) -> (&str, &str) {
        match name.rfind('.') {
            Some(pos) => (&name[..pos], &name[pos + 1..]),
            None => ("main", name),
        }
    }

    fn count(&self, sql: &str, params: &[&str]) -> DbResult<i64> {
        let rows = self.query_strings(sql, params)?;
        let value = rows
            .first()
            .and_then(|row| row.first())
            .cloned()
            .flatten()
            .unwrap_or_default();
        value
            .parse::<i64>()
            .map_err(|_| DbError::ExecutionError(format!("expected a count, got '{value}'")))
    }
}

/// Convert a DuckDB error, keeping the statement text on execution failures.
fn classify(err: duckdb::Error, sql: &str) -> DbError {
    match DbError::from(err) {
        DbError::ExecutionError(msg) => DbError::ExecutionError(format!("{msg}: {sql}")),
        other => other,
    }
}

/// Read a column value as a String, trying multiple DuckDB types.
///
/// DuckDB integer columns return an error for `Option<String>`, so we try
/// String -> i64 -> f64 -> bool. NULL is `None`.
fn column_as_string(row: &duckdb::Row<'_>, idx: usize) -> Option<String> {
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return Some(s);
    }
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return Some(n.to_string());
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return Some(f.to_string());
    }
    if let Ok(Some(b)) = row.get::<_, Option<bool>>(idx) {
        return Some(b.to_string());
    }
    None
}

impl Database for DuckDbBackend {
    fn vendor(&self) -> &str {
        VENDOR
    }

    fn vendor_version(&self) -> &str {
        &self.version
    }

    fn execute(&self, sql: &str) -> DbResult<usize> {
        log::debug!("Executing SQL: {sql}");
        self.conn.execute(sql, []).map_err(|e| classify(e, sql))
    }

    fn execute_with_params(&self, sql: &str, params: &[&str]) -> DbResult<usize> {
        log::debug!("Executing SQL: {sql} {params:?}");
        self.conn
            .execute(
                sql,
                duckdb::params_from_iter(params.iter().map(|p| p.to_string())),
            )
            .map_err(|e| classify(e, sql))
    }

    fn query_strings(&self, sql: &str, params: &[&str]) -> DbResult<Vec<Vec<Option<String>>>> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| classify(e, sql))?;
        let rows = stmt
            .query_map(
                duckdb::params_from_iter(params.iter().map(|p| p.to_string())),
                |row| {
                    // DuckDB panics on `stmt.column_count()` before execution,
                    // so read the count from the executed row.
                    let col_count = row.as_ref().column_count();
                    Ok((0..col_count)
                        .map(|i| column_as_string(row, i))
                        .collect::<Vec<_>>())
                },
            )
            .map_err(|e| classify(e, sql))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| classify(e, sql))?;
        Ok(rows)
    }

    fn commit(&self) -> DbResult<()> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&self) -> DbResult<()> {
        self.end_transaction("ROLLBACK")
    }

    fn close(&self) -> DbResult<()> {
        if self.in_transaction.replace(false) {
            self.conn
                .execute_batch("ROLLBACK")
                .map_err(|e| DbError::TransactionError(format!("ROLLBACK failed: {e}")))?;
        }
        Ok(())
    }

    fn open_independent(&self) -> DbResult<Box<dyn Database>> {
        let conn = self
            .conn
            .try_clone()
            .map_err(|e| DbError::ConnectionError(format!("failed to open second connection: {e}")))?;
        Ok(Box::new(Self::with_connection(conn)?))
    }

    fn column_exists(&self, table: &str, column: &str) -> DbResult<bool> {
        let (schema, table) = Self::split_qualified(table);
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE lower(table_schema) = lower(?) AND lower(table_name) = lower(?) \
             AND lower(column_name) = lower(?)",
            &[schema, table, column],
        )?;
        Ok(count > 0)
    }

    fn table_exists(&self, table: &str) -> DbResult<bool> {
        let (schema, table) = Self::split_qualified(table);
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE lower(table_schema) = lower(?) AND lower(table_name) = lower(?)",
            &[schema, table],
        )?;
        Ok(count > 0)
    }

    fn update_column(
        &self,
        table: &str,
        column: &str,
        where_clause: Option<&str>,
        value: &SqlValue,
    ) -> DbResult<usize> {
        let mut sql = format!("UPDATE {table} SET {column} = ?");
        if let Some(w) = where_clause {
            sql.push_str(&format!(" WHERE {w}"));
        }
        log::debug!("Executing SQL: {sql} [{value}]");
        self.conn
            .execute(&sql, duckdb::params![*value])
            .map_err(|e| classify(e, &sql))
    }

    fn alter_column(&self, table: &str, column: &str, change: &ColumnChange) -> DbResult<()> {
        if let Some(sql_type) = &change.sql_type {
            let mut type_clause = sql_type.clone();
            if let Some(p) = &change.precision {
                type_clause.push_str(&format!("({p})"));
            }
            self.execute(&format!(
                "ALTER TABLE {table} ALTER COLUMN {column} TYPE {type_clause}"
            ))?;
        }
        if let Some(default) = &change.default_value {
            self.execute(&format!(
                "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default}"
            ))?;
        }
        match change.nullable {
            Some(true) => {
                self.execute(&format!(
                    "ALTER TABLE {table} ALTER COLUMN {column} DROP NOT NULL"
                ))?;
            }
            Some(false) => {
                self.execute(&format!(
                    "ALTER TABLE {table} ALTER COLUMN {column} SET NOT NULL"
                ))?;
            }
            None => {}
        }
        if change.reindex {
            log::debug!("DuckDB maintains indexes on write; skipping reindex of {table}");
        }
        Ok(())
    }

    fn add_column(
        &self,
        table: &str,
        column: &str,
        sql_type: &str,
        precision: Option<&str>,
    ) -> DbResult<()> {
        let mut sql = format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}");
        if let Some(p) = precision {
            sql.push_str(&format!("({p})"));
        }
        self.execute(&sql)?;
        Ok(())
    }

    /// DuckDB has no `MODIFY`; the clause is applied as the column's new type.
    fn modify_column(&self, table: &str, column: &str, modify_clause: &str) -> DbResult<()> {
        self.execute(&format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {modify_clause}"
        ))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
