//! Shared helpers for CLI commands

use anyhow::{Context, Result};
use dbu_upgrade::UpgradePlan;
use std::path::Path;

use crate::cli::GlobalArgs;

/// Load the plan named by `--config` and apply the target version override.
///
/// Precedence for the target is `--target-version`, then the
/// `DBUPGRADE_TARGET_VERSION` environment variable, then the file.
pub(crate) fn load_plan(global: &GlobalArgs, target_version: Option<&str>) -> Result<UpgradePlan> {
    let path = Path::new(&global.config);
    let mut plan = UpgradePlan::load(path)
        .with_context(|| format!("Failed to load upgrade plan {}", path.display()))?;
    plan.config.apply_target_override(target_version);
    Ok(plan)
}

/// Join displayable items, or `-` when there are none.
pub(crate) fn join_or_dash<T: std::fmt::Display>(items: &[T]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
