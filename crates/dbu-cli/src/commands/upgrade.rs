//! Upgrade command implementation

use anyhow::{Context, Result};
use dbu_upgrade::{UpgradeReport, Upgrader};

use crate::cli::{GlobalArgs, OutputFormat, UpgradeArgs};
use crate::commands::common::{join_or_dash, load_plan};

/// Execute the upgrade command
pub async fn execute(args: &UpgradeArgs, global: &GlobalArgs) -> Result<()> {
    let plan = load_plan(global, args.target_version.as_deref())?;
    let mut upgrader = Upgrader::new(plan);

    let report = upgrader.run().context("Schema upgrade failed")?;

    match args.output {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn print_report(report: &UpgradeReport) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "Database:      {} {}",
        report.vendor, report.vendor_version
    );
    println!("From version:  {}", report.from_version);
    println!("To version:    {}", report.to_version);
    println!("Applied steps: {}", join_or_dash(&report.applied));
    println!(
        "\nUpgrade complete: {} step(s) applied in {}ms",
        report.applied.len(),
        elapsed.num_milliseconds()
    );
}
