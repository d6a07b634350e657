//! Cosmo Server
//!
//! HTTP front end of the solver runner. Accepts model submissions, reports
//! job status, cancels running jobs and serves the produced artifacts.

use anyhow::{Context, Result};
use cosmo_runner::{JobOrchestrator, RunnerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cosmo_server=debug,cosmo_runner=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cosmo Server...");

    let config = RunnerConfig::from_env();
    config.validate().context("Invalid runner configuration")?;

    tracing::info!(
        "Work directory: {} (compiler: {}, fallback: {}, timeout: {}s, parallel jobs: {})",
        config.work_dir.display(),
        config.compiler,
        config.fallback_compiler.as_deref().unwrap_or("none"),
        config.job_timeout.as_secs(),
        config.max_parallel_jobs
    );
    if !config.work_dir.is_dir() {
        tracing::warn!(
            "Work directory {} does not exist yet, submissions will fail until it does",
            config.work_dir.display()
        );
    }

    let frontend_url = std::env::var("COSMO_FRONTEND_URL")
        .ok()
        .filter(|s| !s.trim().is_empty());

    let orchestrator = JobOrchestrator::new(config);
    let app = api::create_router(orchestrator).layer(api::cors::cors_layer(frontend_url));

    let addr = std::env::var("COSMO_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
