//! API Module
//!
//! HTTP API layer of the solver service.
//! Every route lives under [`API_PREFIX`].

pub mod cors;
pub mod error;
pub mod files;
pub mod health;
pub mod job;

use axum::{
    Router,
    routing::{get, post},
};
use cosmo_runner::JobOrchestrator;
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/api/cosmo-perturbations";

/// Response header carrying the id of a newly submitted job
pub const EXECUTION_ID_HEADER: &str = "x-execution-id";

/// Create the main API router with all endpoints
pub fn create_router(orchestrator: JobOrchestrator) -> Router {
    let api = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/calculate", post(job::calculate))
        .route("/status/{id}", get(job::get_status))
        .route("/cancel/{id}", post(job::cancel))
        // Artifacts
        .route("/files/{name}", get(files::get_file))
        .with_state(orchestrator);

    Router::new()
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
}
