//! List command implementation

use anyhow::Result;
use dbu_upgrade::{SchemaSpec, Task, UpgradePlan};
use serde::Serialize;

use crate::cli::{GlobalArgs, ListArgs, OutputFormat};
use crate::commands::common::load_plan;

/// Execute the list command
pub async fn execute(args: &ListArgs, global: &GlobalArgs) -> Result<()> {
    let plan = load_plan(global, None)?;
    let steps = step_infos(&plan);

    match args.output {
        OutputFormat::Text => print_table(&steps),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&steps)?),
    }
    Ok(())
}

/// Step information for display
#[derive(Debug, Serialize)]
struct StepInfo {
    version: String,
    tasks: Vec<TaskInfo>,
}

#[derive(Debug, Serialize)]
struct TaskInfo {
    kind: &'static str,
    target_vendor: Option<String>,
    ignore_error: bool,
}

fn step_infos(plan: &UpgradePlan) -> Vec<StepInfo> {
    plan.steps.iter().map(step_info).collect()
}

fn step_info(step: &SchemaSpec) -> StepInfo {
    StepInfo {
        version: step.declared_version().unwrap_or("?").to_string(),
        tasks: step.tasks.iter().map(task_info).collect(),
    }
}

fn task_info(task: &Task) -> TaskInfo {
    TaskInfo {
        kind: task.name(),
        target_vendor: task.target.target_vendor.clone(),
        ignore_error: task.ignore_error,
    }
}

fn describe(task: &TaskInfo) -> String {
    let mut text = task.kind.to_string();
    if let Some(vendor) = &task.target_vendor {
        text.push_str(&format!("@{vendor}"));
    }
    if task.ignore_error {
        text.push('?');
    }
    text
}

/// Print steps in table format
fn print_table(steps: &[StepInfo]) {
    if steps.is_empty() {
        println!("No schema steps declared.");
        return;
    }

    let version_width = steps
        .iter()
        .map(|s| s.version.len())
        .max()
        .unwrap_or(7)
        .max(7);

    println!("{:<version_width$}  TASKS", "VERSION");
    println!("{:-<version_width$}  {}", "", "-".repeat(40));
    for step in steps {
        let tasks = if step.tasks.is_empty() {
            "-".to_string()
        } else {
            step.tasks.iter().map(describe).collect::<Vec<_>>().join(", ")
        };
        println!("{:<version_width$}  {}", step.version, tasks);
    }

    let task_count: usize = steps.iter().map(|s| s.tasks.len()).sum();
    println!("\n{} step(s), {} task(s)", steps.len(), task_count);
}

#[cfg(test)]
#[path = "list_test.rs"]
mod tests;
