// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wagate - a multi-tenant chat-protocol gateway.
//!
//! Binary entry point: parses the CLI, loads configuration, and runs the
//! server with its queue workers.

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Wagate - a multi-tenant chat-protocol gateway.
#[derive(Parser, Debug)]
#[command(name = "wagate", version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file (overrides the XDG hierarchy).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server and queue workers.
    Serve,
    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(cli: &Cli) -> wagate_config::WagateConfig {
    let result = match &cli.config {
        Some(path) => wagate_config::load_and_validate_path(path),
        None => wagate_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("wagate: {e}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = load_config(&cli);
            if let Err(e) = serve::run(config).await {
                tracing::error!(error = %e, "server exited with error");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            let config = load_config(&cli);
            match toml::to_string_pretty(&config) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => {
                    eprintln!("wagate: cannot render config: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("wagate: use --help for available commands");
        }
    }
}
