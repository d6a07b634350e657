//! Artifact and health command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::*;
use cosmo_client::SolverClient;

/// Download an artifact to disk
pub async fn fetch(client: &SolverClient, name: &str, output: Option<PathBuf>) -> Result<()> {
    let bytes = client
        .fetch_artifact(name)
        .await
        .with_context(|| format!("Failed to fetch {}", name))?;

    let path = output.unwrap_or_else(|| PathBuf::from(name));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Saved {} ({} bytes) to {}",
        "✓".green(),
        name.cyan(),
        bytes.len(),
        path.display()
    );

    Ok(())
}

pub async fn health(client: &SolverClient) -> Result<()> {
    let status = client.health().await?;
    println!("{} {}", "✓".green(), status);
    Ok(())
}
