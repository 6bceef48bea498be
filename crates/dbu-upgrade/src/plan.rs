//! Upgrade plan files.
//!
//! A plan is the configuration plus the ordered step declarations:
//!
//! ```yaml
//! database:
//!   path: rhq.duckdb
//! target_schema_version: LATEST
//! steps:
//!   - version: "2.1"
//!     tasks:
//!       - kind: add_column
//!         table: rhq_alert
//!         column: ack_time
//!         column_type: LONG
//! ```

use crate::error::UpgradeResult;
use crate::step::SchemaSpec;
use dbu_core::config::read_config_file;
use dbu_core::UpgradeConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration and steps for one upgrade run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpgradePlan {
    #[serde(flatten)]
    pub config: UpgradeConfig,

    /// Steps in ascending version order
    #[serde(default)]
    pub steps: Vec<SchemaSpec>,

    /// Directory relative paths in the plan resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl UpgradePlan {
    /// Load a plan file.
    pub fn load(path: &Path) -> UpgradeResult<Self> {
        let content = read_config_file(path)?;
        let mut plan = Self::from_yaml_str(&content)?;
        plan.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        log::debug!(
            "Loaded upgrade plan {} with {} step(s)",
            path.display(),
            plan.steps.len()
        );
        Ok(plan)
    }

    /// Parse a plan document; relative paths resolve against the working directory.
    pub fn from_yaml_str(yaml: &str) -> UpgradeResult<Self> {
        let plan: UpgradePlan = serde_yaml::from_str(yaml).map_err(dbu_core::CoreError::from)?;
        Ok(plan)
    }

    /// Resolved path of the type map override, if one is configured.
    pub fn type_map_path(&self) -> Option<PathBuf> {
        self.config.type_map_path(&self.base_dir)
    }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
