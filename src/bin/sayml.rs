//! Sayml CLI Binary
//!
//! Command-line interface for materializing documents into a record store.

use anyhow::Context;
use clap::Parser;
use sayml::logging::init_logging;
use sayml::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli.store.clone(), cli.config.clone())
        .context("failed to load configuration")?;

    let logging = cli.logging_config(&context.config().logging);
    init_logging(Some(&logging)).context("failed to initialize logging")?;

    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
