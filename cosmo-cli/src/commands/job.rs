//! Job command handlers
//!
//! Submitting, polling, waiting for and cancelling calculations.

use std::time::Duration;

use anyhow::{Result, bail};
use colored::*;
use cosmo_client::SolverClient;
use cosmo_core::domain::job::JobStatus;
use cosmo_core::dto::job::JobStatusResponse;

use crate::request::SubmitArgs;

/// Submit a model, optionally waiting for the result
pub async fn submit(client: &SolverClient, args: SubmitArgs, wait_for_result: bool) -> Result<()> {
    let req = args.into_request()?;
    let submitted = client.submit(&req).await?;
    let id = submitted.execution_id.to_string();

    println!("{} {}", "✓".green(), submitted.message);
    println!("  Execution ID: {}", id.cyan());

    if wait_for_result {
        println!();
        return wait(client, &id, 2, None).await;
    }

    Ok(())
}

pub async fn status(client: &SolverClient, id: &str) -> Result<()> {
    let status = client.status(id).await?;
    print_status(&status);
    Ok(())
}

pub async fn cancel(client: &SolverClient, id: &str) -> Result<()> {
    let response = client.cancel(id).await?;
    println!("{} {}", "✓".green(), response.message);
    Ok(())
}

/// Poll until the execution finishes; fails unless it completed
pub async fn wait(
    client: &SolverClient,
    id: &str,
    interval_secs: u64,
    timeout_secs: Option<u64>,
) -> Result<()> {
    println!("{}", format!("Waiting for execution {}...", id).dimmed());

    let status = client
        .wait_for_completion(
            id,
            Duration::from_secs(interval_secs.max(1)),
            timeout_secs.map(Duration::from_secs),
        )
        .await?;

    print_status(&status);

    if status.status != JobStatus::Completed {
        bail!("Execution {} finished with status {}", id, status.status);
    }
    Ok(())
}

fn print_status(status: &JobStatusResponse) {
    println!("{}", "Execution:".bold());
    println!("  ID:      {}", status.execution_id.to_string().cyan());
    println!("  Status:  {}", colorize_status(status.status));
    println!("  Message: {}", status.message);

    if let Some(success) = status.success {
        println!(
            "  Success: {}",
            if success { "✓".green() } else { "✗".red() }
        );
    }

    if let Some(files) = &status.output_files {
        if files.is_empty() {
            println!("\n{}", "No output files.".yellow());
        } else {
            println!("\n{}", format!("Output files ({}):", files.len()).bold());
            for file in files {
                println!("  {} {}", "▸".cyan(), file);
            }
        }
    }

    if let Some(output) = &status.output {
        if !output.trim().is_empty() {
            println!("\n{}", "Output:".bold());
            println!("{}", "─".repeat(80).dimmed());
            print!("{}", output);
            if !output.ends_with('\n') {
                println!();
            }
            println!("{}", "─".repeat(80).dimmed());
        }
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        JobStatus::Submitted => text.yellow(),
        JobStatus::Running => text.cyan(),
        JobStatus::Completed => text.green(),
        JobStatus::Failed => text.red(),
        JobStatus::Cancelled => text.dimmed(),
    }
}
