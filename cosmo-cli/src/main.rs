//! Cosmo CLI
//!
//! Command-line interface for the solver service.

mod commands;
mod config;
mod request;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "cosmo")]
#[command(about = "Cosmological perturbation solver CLI", long_about = None)]
struct Cli {
    /// Solver service URL
    #[arg(long, env = "COSMO_SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
    };

    handle_command(cli.command, &config).await
}
