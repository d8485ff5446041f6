//! # CLI Behavior
//!
//! This is an operator's tool, not part of request handling. It reads the same
//! configuration and storage directory as the host application and works on
//! them offline.
//!
//! ## Storage Directory
//!
//! Resolved in order: `--data`, `persistence.file.path` from `stateforge.toml`,
//! the `STATEFORGE_DATA` environment variable, then the OS data directory.
//!
//! ## Logging
//!
//! Library events go to stderr through `tracing-subscriber`. `RUST_LOG` takes
//! precedence; otherwise the level is `warn`, or `debug` with `--verbose`.

mod commands;
mod setup;

use clap::Parser;
use setup::{Cli, Commands};
use stateforge::init::{default_search_dirs, load_config};
use tracing_subscriber::EnvFilter;

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(&default_search_dirs());
    if let Some(data) = &cli.data {
        config.set_storage_dir(data.clone());
    }
    tracing::debug!(storage = %config.storage_dir().display(), "configuration loaded");

    match cli.command {
        Commands::Cleanup { days } => commands::cleanup(config, days),
        Commands::Clients => commands::clients(config),
        Commands::MakeStore { name, dir } => commands::make_store(&name, &dir),
        Commands::Config { action } => commands::config(&config, action.as_ref()),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
