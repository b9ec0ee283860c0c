//! Remedy CLI: the main entry point.
//!
//! Commands:
//! - `serve`   Start the webhook gateway that runs remediations
//! - `todo`    Start the to-do service (the application under test)
//! - `run`     Run one remediation from a JSON event file or stdin
//! - `tools`   List the tools the agent can call
//! - `config`  Show the effective configuration

use clap::{Parser, Subcommand};
use remedy_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "remedy",
    about = "Remedy: turns error-log webhooks into fix pull requests",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.remedy/config.toml)
    #[arg(short, long, global = true, env = "REMEDY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start the to-do service
    Todo {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one remediation and print the outcome as JSON
    Run {
        /// Event JSON file (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Include the full transcript in the output
        #[arg(long)]
        transcript: bool,
    },

    /// List the tool catalog
    Tools,

    /// Show the effective configuration
    Config {
        /// Print the default configuration as TOML instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with_overrides(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    remedy_cli::logging::init(&config.logging, cli.verbose);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Todo { port } => commands::todo::run(config, port).await?,
        Commands::Run { file, transcript } => commands::run::run(config, file, transcript).await?,
        Commands::Tools => commands::tools::run(config).await?,
        Commands::Config { default } => commands::config::run(&config, cli.config.as_deref(), default)?,
    }

    Ok(())
}
