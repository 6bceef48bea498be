//! dbu-db - Database abstraction layer for dbupgrade
//!
//! This crate provides the vendor-neutral `Database` facade used by upgrade
//! tasks and the orchestrator, plus its DuckDB implementation.

pub mod duckdb;
pub mod error;
pub mod traits;
pub mod value;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::{ColumnChange, Database};
pub use value::SqlValue;
