//! Configuration types for the upgrade engine.
//!
//! [`UpgradeConfig`] carries everything the orchestrator needs besides the
//! step declarations: the connection target, the persisted version row, the
//! optional type map override and the requested target version.

use crate::error::{CoreError, CoreResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `target_schema_version`.
pub const TARGET_VERSION_ENV: &str = "DBUPGRADE_TARGET_VERSION";

/// Upgrade configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpgradeConfig {
    /// Target database connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Location of the persisted schema version row
    #[serde(default)]
    pub version_table: VersionTableConfig,

    /// Replacement for the built-in generic type mapping
    #[serde(default)]
    pub type_map_file: Option<PathBuf>,

    /// Desired end state, or `LATEST`
    #[serde(default)]
    pub target_schema_version: Option<String>,
}

/// Database backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// DuckDB (default)
    #[default]
    DuckDb,
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbType::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Backend type
    #[serde(rename = "type", default)]
    pub db_type: DbType,

    /// Connection target (file path or `:memory:` for DuckDB)
    #[serde(default)]
    pub path: Option<String>,

    /// Login user, for backends that authenticate
    #[serde(default)]
    pub user: Option<String>,

    /// Login password, for backends that authenticate
    #[serde(default)]
    pub password: Option<String>,
}

/// Where the current schema version is stored.
///
/// Describes `SELECT value_column FROM table WHERE key_column = key_match`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionTableConfig {
    #[serde(default = "default_version_table")]
    pub table: String,

    #[serde(default = "default_value_column")]
    pub value_column: String,

    #[serde(default = "default_key_column")]
    pub key_column: String,

    #[serde(default = "default_key_match")]
    pub key_match: String,
}

impl Default for VersionTableConfig {
    fn default() -> Self {
        Self {
            table: default_version_table(),
            value_column: default_value_column(),
            key_column: default_key_column(),
            key_match: default_key_match(),
        }
    }
}

fn default_version_table() -> String {
    "rhq_system_config".to_string()
}

fn default_value_column() -> String {
    "property_value".to_string()
}

fn default_key_column() -> String {
    "property_key".to_string()
}

fn default_key_match() -> String {
    "DB_SCHEMA_VERSION".to_string()
}

impl VersionTableConfig {
    /// Query returning the current version; binds `key_match` as its only parameter.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.value_column, self.table, self.key_column
        )
    }

    /// Statement writing a new version; binds the value then `key_match`.
    pub fn update_sql(&self) -> String {
        format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            self.table, self.value_column, self.key_column
        )
    }

    fn validate(&self) -> CoreResult<()> {
        let fields = [
            ("version_table.table", &self.table),
            ("version_table.value_column", &self.value_column),
            ("version_table.key_column", &self.key_column),
            ("version_table.key_match", &self.key_match),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{name} cannot be empty"),
                });
            }
        }
        Ok(())
    }
}

impl UpgradeConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = read_config_file(path)?;
        let config: UpgradeConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Check the settings that must be present before connecting.
    pub fn validate(&self) -> CoreResult<()> {
        match self.database.path.as_deref() {
            Some(p) if !p.trim().is_empty() => {}
            _ => {
                return Err(CoreError::ConfigInvalid {
                    message: "database.path (connection target) must be specified".to_string(),
                })
            }
        }

        match self.target_schema_version.as_deref() {
            Some(v) if !v.trim().is_empty() => {}
            _ => {
                return Err(CoreError::ConfigInvalid {
                    message: "target_schema_version must be specified (a version or LATEST)"
                        .to_string(),
                })
            }
        }

        self.version_table.validate()
    }

    /// Resolve the target version with precedence CLI > env var > file.
    pub fn resolve_target_version(&self, cli_target: Option<&str>) -> Option<String> {
        cli_target
            .map(String::from)
            .or_else(|| std::env::var(TARGET_VERSION_ENV).ok())
            .or_else(|| self.target_schema_version.clone())
    }

    /// Apply [`resolve_target_version`](Self::resolve_target_version) in place.
    pub fn apply_target_override(&mut self, cli_target: Option<&str>) {
        let resolved = self.resolve_target_version(cli_target);
        if resolved != self.target_schema_version {
            log::debug!(
                "Target schema version overridden: {:?} -> {:?}",
                self.target_schema_version,
                resolved
            );
        }
        self.target_schema_version = resolved;
    }

    /// Resolve `type_map_file` against the directory holding the config file.
    pub fn type_map_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.type_map_file.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                base_dir.join(p)
            }
        })
    }
}

/// Read a configuration file, mapping IO failures to [`CoreError`].
pub fn read_config_file(path: &Path) -> CoreResult<String> {
    if !path.exists() {
        return Err(CoreError::ConfigNotFound {
            path: path.display().to_string(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
