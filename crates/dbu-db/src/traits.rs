//! Database facade trait definition

use crate::error::{DbError, DbResult};
use crate::value::SqlValue;

/// Requested changes for an ALTER of an existing column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnChange {
    /// New vendor SQL type (already mapped from the generic type)
    pub sql_type: Option<String>,
    /// Precision appended to the type, e.g. `255`
    pub precision: Option<String>,
    /// New default value expression
    pub default_value: Option<String>,
    /// `Some(true)` drops NOT NULL, `Some(false)` sets it
    pub nullable: Option<bool>,
    /// Rebuild indexes on the table afterwards
    pub reindex: bool,
}

/// Vendor-neutral DDL/DML facade over one live connection.
///
/// Connections operate in manual-commit mode: a transaction is always open,
/// and [`commit`](Self::commit) / [`rollback`](Self::rollback) end it and
/// start the next one. The provided methods build portable SQL; backends
/// override the ones whose syntax differs.
pub trait Database {
    /// Vendor name, e.g. `duckdb`, `postgresql`, `oracle`
    fn vendor(&self) -> &str;

    /// Vendor product version reported by the server
    fn vendor_version(&self) -> &str;

    /// Execute a statement, returning affected rows
    fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute a statement with text parameters bound positionally
    fn execute_with_params(&self, sql: &str, params: &[&str]) -> DbResult<usize>;

    /// Run a query with text parameters and return every row as strings
    fn query_strings(&self, sql: &str, params: &[&str]) -> DbResult<Vec<Vec<Option<String>>>>;

    /// Make the current transaction's work durable and begin a new one
    fn commit(&self) -> DbResult<()>;

    /// Discard the current transaction's work and begin a new one
    fn rollback(&self) -> DbResult<()>;

    /// Roll back any open transaction and release the connection
    fn close(&self) -> DbResult<()>;

    /// Open a second connection to the same database with its own transaction scope
    fn open_independent(&self) -> DbResult<Box<dyn Database>>;

    /// Check whether `table` has a column named `column` (case-insensitive)
    fn column_exists(&self, table: &str, column: &str) -> DbResult<bool>;

    /// Check whether `table` exists
    fn table_exists(&self, table: &str) -> DbResult<bool> {
        match self.query_strings(&format!("SELECT COUNT(*) FROM {table}"), &[]) {
            Ok(_) => Ok(true),
            Err(DbError::TableNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Set a column to `value` on rows matching `where_clause` (all rows when `None`)
    fn update_column(
        &self,
        table: &str,
        column: &str,
        where_clause: Option<&str>,
        value: &SqlValue,
    ) -> DbResult<usize>;

    /// Apply type, default and nullability changes to an existing column
    fn alter_column(&self, table: &str, column: &str, change: &ColumnChange) -> DbResult<()>;

    /// Whether the connected vendor (and version, when given) matches, case-insensitively
    fn matches(&self, vendor: Option<&str>, version: Option<&str>) -> bool {
        if let Some(v) = vendor {
            if !v.eq_ignore_ascii_case(self.vendor()) {
                return false;
            }
        }
        if let Some(v) = version {
            if !v.eq_ignore_ascii_case(self.vendor_version()) {
                return false;
            }
        }
        true
    }

    /// Add a column of an already-mapped SQL type
    fn add_column(
        &self,
        table: &str,
        column: &str,
        sql_type: &str,
        precision: Option<&str>,
    ) -> DbResult<()> {
        let mut sql = format!("ALTER TABLE {table} ADD {column} {sql_type}");
        if let Some(p) = precision {
            sql.push_str(&format!("({p})"));
        }
        self.execute(&sql)?;
        Ok(())
    }

    /// Drop a column
    fn delete_column(&self, table: &str, column: &str) -> DbResult<()> {
        self.execute(&format!("ALTER TABLE {table} DROP COLUMN {column}"))?;
        Ok(())
    }

    /// Modify a column with a raw vendor clause
    fn modify_column(&self, table: &str, column: &str, modify_clause: &str) -> DbResult<()> {
        self.execute(&format!(
            "ALTER TABLE {table} MODIFY ({column} {modify_clause})"
        ))?;
        Ok(())
    }

    /// Drop a table
    fn drop_table(&self, table: &str) -> DbResult<()> {
        self.execute(&format!("DROP TABLE {table}"))?;
        Ok(())
    }

    /// Create a sequence
    fn create_sequence(&self, name: &str, initial: i64, increment: i64) -> DbResult<()> {
        self.execute(&format!(
            "CREATE SEQUENCE {name} START WITH {initial} INCREMENT BY {increment}"
        ))?;
        Ok(())
    }

    /// Insert using the clause that follows `INSERT INTO <table>`
    fn insert(&self, table: &str, insert_clause: &str) -> DbResult<usize> {
        self.execute(&format!("INSERT INTO {table} {insert_clause}"))
    }

    /// Introspection query listing FK constraint names that reference
    /// `table.column`, for vendors that support one
    fn foreign_key_query(&self, table: &str, column: &str) -> Option<String> {
        let table = table.replace('\'', "''");
        let column = column.replace('\'', "''");
        if self.vendor().eq_ignore_ascii_case("postgresql") {
            Some(format!(
                "SELECT tc.constraint_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                  AND tc.table_schema = kcu.table_schema \
                 WHERE tc.constraint_type = 'FOREIGN KEY' \
                   AND lower(tc.table_name) = lower('{table}') \
                   AND lower(kcu.column_name) = lower('{column}')"
            ))
        } else if self.vendor().eq_ignore_ascii_case("oracle") {
            Some(format!(
                "SELECT uc.constraint_name \
                 FROM user_constraints uc \
                 JOIN user_cons_columns ucc \
                   ON uc.constraint_name = ucc.constraint_name \
                 WHERE uc.constraint_type = 'R' \
                   AND uc.table_name = upper('{table}') \
                   AND ucc.column_name = upper('{column}')"
            ))
        } else {
            None
        }
    }

    /// Drop a named constraint from a table
    fn drop_constraint(&self, table: &str, constraint: &str) -> DbResult<()> {
        self.execute(&format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}"))?;
        Ok(())
    }
}
