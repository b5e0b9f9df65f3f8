// SPDX-FileCopyrightText: 2026 Guildsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! guildsync - keeps a chat guild in step with a game server.
//!
//! The binary validates and inspects configuration; the reconciliation core
//! itself is embedded by the host through `guildsync-sync`.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use guildsync_config::{ConfigError, SyncConfig};

mod check;
mod mappings;

/// guildsync - keeps a chat guild in step with a game server.
#[derive(Parser, Debug)]
#[command(name = "guildsync", version, about, long_about = None)]
struct Cli {
    /// Read this file instead of the standard config locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate the configuration, then summarize it.
    Check,
    /// Print the group -> role table with lookup results.
    Mappings,
}

fn load(path: Option<&Path>) -> Result<SyncConfig, Vec<ConfigError>> {
    match path {
        Some(path) => guildsync_config::load_and_validate_path(path),
        None => guildsync_config::load_and_validate(),
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            guildsync_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.daemon.log_level);

    match cli.command {
        Some(Commands::Check) => check::run(&config),
        Some(Commands::Mappings) => mappings::run(&config),
        None => {
            println!("guildsync: use --help for available commands");
        }
    }
}

/// Initialize tracing with an EnvFilter; `RUST_LOG` wins over `log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("guildsync={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
