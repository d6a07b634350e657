//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod files;
mod job;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;
use crate::request::SubmitArgs;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a model for calculation
    Submit {
        #[command(flatten)]
        args: SubmitArgs,

        /// Wait for the calculation to finish
        #[arg(short, long)]
        wait: bool,
    },
    /// Show the status of an execution
    Status {
        /// Execution ID
        id: String,
    },
    /// Cancel a running execution
    Cancel {
        /// Execution ID
        id: String,
    },
    /// Wait until an execution finishes
    Wait {
        /// Execution ID
        id: String,

        /// Seconds between status checks
        #[arg(long, default_value_t = 2)]
        interval: u64,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Download an output file or plot
    Fetch {
        /// File name as listed in the execution's output files
        name: String,

        /// Destination path (defaults to the file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that the service is up
    Health,
}

/// Handle a CLI command
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = cosmo_client::SolverClient::new(&config.server_url);

    match command {
        Commands::Submit { args, wait } => job::submit(&client, args, wait).await,
        Commands::Status { id } => job::status(&client, &id).await,
        Commands::Cancel { id } => job::cancel(&client, &id).await,
        Commands::Wait {
            id,
            interval,
            timeout,
        } => job::wait(&client, &id, interval, timeout).await,
        Commands::Fetch { name, output } => files::fetch(&client, &name, output).await,
        Commands::Health => files::health(&client).await,
    }
}
