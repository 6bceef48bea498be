//! Validate command implementation

use anyhow::{Context, Result};
use dbu_upgrade::Upgrader;

use crate::cli::{GlobalArgs, ValidateArgs};
use crate::commands::common::load_plan;

/// Execute the validate command
pub async fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let plan = load_plan(global, args.target_version.as_deref())?;
    let steps = plan.steps.len();
    let tasks: usize = plan.steps.iter().map(|s| s.tasks.len()).sum();
    let target = plan
        .config
        .target_schema_version
        .clone()
        .unwrap_or_default();

    let mut upgrader = Upgrader::new(plan);
    upgrader.validate().context("Upgrade plan is invalid")?;

    println!("Upgrade plan {} is valid", global.config);
    println!("  {steps} step(s), {tasks} task(s), target version {target}");
    Ok(())
}
