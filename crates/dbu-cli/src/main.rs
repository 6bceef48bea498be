//! dbupgrade CLI - versioned, transactional database schema upgrades

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod logger;

use cli::Cli;
use commands::{list, status, upgrade, validate};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.global.verbose)?;

    match &cli.command {
        cli::Commands::Upgrade(args) => upgrade::execute(args, &cli.global).await,
        cli::Commands::Status(args) => status::execute(args, &cli.global).await,
        cli::Commands::Validate(args) => validate::execute(args, &cli.global).await,
        cli::Commands::List(args) => list::execute(args, &cli.global).await,
    }
}
