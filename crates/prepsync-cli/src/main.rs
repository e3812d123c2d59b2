//! prepsync CLI
//!
//! Command-line interface for prepsync - realtime pickup slot
//! coordination.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prepsync_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "prepsync")]
#[command(about = "prepsync - realtime pickup slot coordination server")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the realtime sync server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        addr: Option<String>,

        /// SQLite database path (overrides config data_dir)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Lead time in minutes (overrides config)
        #[arg(long)]
        lead_time: Option<i64>,
    },
    /// Print the day's slots and their occupancy
    Slots {
        /// SQLite database path (overrides config data_dir)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path).context("Failed to load configuration"),
        None => Config::load().context("Failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve {
            addr,
            db,
            lead_time,
        } => commands::serve::run(config, addr, db, lead_time).await,
        Commands::Slots { db } => commands::slots::show(config, db).await,
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&config),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(config, key, value, cli.config.as_ref())
            }
        },
    }
}
