//! Sandsync CLI Binary
//!
//! Command-line interface for mirroring a file tree into a local sandbox.

use anyhow::Context;
use clap::Parser;
use sandsync::logging::init_logging;
use sandsync::tooling::cli::{Cli, CliContext};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let context = CliContext::new(cli.workspace.clone(), cli.config.clone(), cli.sandbox.clone())
        .context("Error initializing workspace")?;

    let logging = cli.logging_config(&context.config().logging);
    init_logging(Some(&logging)).context("Error initializing logging")?;

    let output = context.execute(&cli.command)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
