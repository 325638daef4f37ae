// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proplink - tenant incident reporting over a chat transport.
//!
//! Binary entry point: loads configuration, then dispatches to the
//! subcommand implementations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod console;
mod local;
mod run;
mod status;

/// Proplink - tenant incident reporting over a chat transport.
#[derive(Parser, Debug)]
#[command(name = "proplink", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (overrides the XDG lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the engine with the console transport.
    Run(run::RunArgs),
    /// Show stored session state.
    Status {
        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Invalidate the stored pairing so the next run shows a fresh QR.
    Logout,
    /// Manage Proplink configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Load the configuration and report the effective values.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => proplink_config::loader::load_config_from_path(path),
        None => proplink_config::loader::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("proplink: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Run(args)) => run::run(config, args).await,
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        Some(Commands::Logout) => run::run_logout(&config).await,
        Some(Commands::Config {
            command: ConfigCommands::Check,
        }) => {
            print_config_summary(&config);
            Ok(())
        }
        None => {
            println!("proplink: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("proplink: {e}");
        std::process::exit(1);
    }
}

fn print_config_summary(config: &proplink_config::model::ProplinkConfig) {
    println!("configuration ok");
    println!("  engine.name               = {}", config.engine.name);
    println!("  engine.country_code       = {}", config.engine.country_code);
    println!(
        "  engine.min_description_len = {}",
        config.engine.min_description_len
    );
    println!("  transport.session_id      = {}", config.transport.session_id);
    println!(
        "  transport.max_send_attempts = {}",
        config.transport.max_send_attempts
    );
    println!("  storage.database_path     = {}", config.storage.database_path);
    println!("  storage.wal_mode          = {}", config.storage.wal_mode);
    println!(
        "  classifier.confidence_threshold = {}",
        config.classifier.confidence_threshold
    );
}
