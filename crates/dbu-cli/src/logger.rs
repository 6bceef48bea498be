//! Console logging for the CLI.
//!
//! Library crates only use the `log` facade; the binary routes records to
//! stderr so report output on stdout stays machine-readable.

use anyhow::{Context, Result};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const STDERR_APPENDER: &str = "stderr";

/// Install the stderr logger: `info` by default, `debug` when verbose.
pub(crate) fn init(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {m}{n}",
        )))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build(STDERR_APPENDER, Box::new(stderr)))
        .build(Root::builder().appender(STDERR_APPENDER).build(level))
        .context("Invalid logger configuration")?;

    log4rs::init_config(config).context("Failed to install logger")?;
    Ok(())
}
