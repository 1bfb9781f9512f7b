#![allow(clippy::print_stdout)]

mod args;
mod commands;
mod settings;

use crate::args::Cli;
use crate::settings::{LogSettings, Overrides, load_config};
use anyhow::{Context, Result};
use clap::Parser;
use depot_logger::{LevelFilter, Logger};
use std::io::IsTerminal;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_config(
        cli.config.as_deref(),
        Overrides { root: cli.root.clone(), base_url: cli.base_url.clone() },
    )
    .context("Configuration is malformed")?;

    let _log = init_logger(&settings.log, cli.verbose)?;

    commands::run(cli.command, settings.storage).await
}

fn init_logger(settings: &LogSettings, verbose: u8) -> Result<Logger> {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let builder = Logger::builder()
        .name(env!("CARGO_BIN_NAME"))
        .level(level)
        .ansi(std::io::stderr().is_terminal());
    let builder = match &settings.filter {
        Some(filter) => builder.env_filter(filter),
        None => builder,
    };

    let logger = match &settings.path {
        Some(path) => {
            let builder = builder.path(path).json(settings.json);
            match settings.max_files {
                Some(max) => builder.max_files(max).init(),
                None => builder.init(),
            }
        },
        None => builder.init(),
    };

    logger.context("Failed to initialize logging")
}
