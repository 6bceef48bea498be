//! Status command implementation

use anyhow::{Context, Result};
use dbu_db::{Database, DuckDbBackend};
use dbu_upgrade::{UpgradePreview, Upgrader};

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{join_or_dash, load_plan};

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let plan = load_plan(global, args.target_version.as_deref())?;
    let mut upgrader = Upgrader::new(plan);
    upgrader.validate().context("Invalid upgrade plan")?;

    let db = DuckDbBackend::from_config(&upgrader.plan().config.database)
        .context("Failed to connect to database")?;
    let preview = upgrader.preview(&db);
    if let Err(e) = db.close() {
        log::warn!("Failed to close database connection: {e}");
    }
    let preview = preview.context("Failed to read schema status")?;

    match args.output {
        OutputFormat::Text => print_preview(&preview),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&preview)?),
    }
    Ok(())
}

fn print_preview(preview: &UpgradePreview) {
    println!("Current version: {}", preview.current_version);
    if preview.requested_version.is_latest() {
        println!("Target version:  {} (LATEST)", preview.target_version);
    } else {
        println!("Target version:  {}", preview.target_version);
    }
    if preview.target_version < preview.current_version {
        println!("Pending steps:   - (target is older than the database)");
    } else {
        println!("Pending steps:   {}", join_or_dash(&preview.pending));
    }
    if let Some(marker) = &preview.interrupted {
        println!("\nWARNING: a previous upgrade was interrupted ({marker}).");
        println!("The next upgrade run restores the version row and stops for inspection.");
    }
}
