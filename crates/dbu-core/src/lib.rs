//! dbu-core - Core library for dbupgrade
//!
//! This crate provides the schema version value type, the generic column
//! type mapping, and the upgrade configuration shared by all dbupgrade
//! components.

pub mod config;
pub mod error;
pub mod type_map;
pub mod version;

pub use config::{DatabaseConfig, DbType, UpgradeConfig, VersionTableConfig};
pub use error::{CoreError, CoreResult};
pub use type_map::{TypeMap, TypeMapping, ValueKind};
pub use version::SchemaVersion;
