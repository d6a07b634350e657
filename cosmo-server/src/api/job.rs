//! Job API Handlers
//!
//! HTTP endpoints for submitting, polling and cancelling calculations.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use cosmo_core::domain::job::JobStatus;
use cosmo_core::dto::job::{CancelResponse, JobStatusResponse, SubmitJob, SubmitResponse};
use cosmo_runner::{CancelOutcome, JobOrchestrator};
use uuid::Uuid;

use crate::api::EXECUTION_ID_HEADER;
use crate::api::error::{ApiError, ApiResult};

/// Ids are opaque to callers; anything that is not a job id is simply unknown
fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

/// POST /calculate
/// Validate a model submission and start the calculation
pub async fn calculate(
    State(orchestrator): State<JobOrchestrator>,
    payload: Result<Json<SubmitJob>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload.map_err(|e| {
        tracing::warn!("Rejected request body: {}", e.body_text());
        ApiError::BadRequest(format!("Invalid request body: {}", e.body_text()))
    })?;

    let id = orchestrator.submit(req).map_err(|e| {
        tracing::warn!("Validation failed: {}", e);
        ApiError::from(e)
    })?;

    tracing::info!("Calculation started with execution id {}", id);

    let body = SubmitResponse {
        execution_id: id,
        status: JobStatus::Running,
        message: "Calculation started. Use the execution ID to check status or cancel."
            .to_string(),
    };

    Ok(([(EXECUTION_ID_HEADER, id.to_string())], Json(body)))
}

/// GET /status/{id}
/// Get the status, and once finished the result, of a calculation
pub async fn get_status(
    State(orchestrator): State<JobOrchestrator>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    tracing::debug!("Status check for execution: {}", id);

    let job = parse_id(&id)
        .and_then(|id| orchestrator.status(&id))
        .ok_or_else(|| ApiError::NotFound("Execution not found".to_string()))?;

    Ok(Json(JobStatusResponse::from(&job)))
}

/// POST /cancel/{id}
/// Kill a running calculation
pub async fn cancel(
    State(orchestrator): State<JobOrchestrator>,
    Path(id): Path<String>,
) -> (StatusCode, Json<CancelResponse>) {
    tracing::info!("Received cancel request for execution: {}", id);

    let outcome = match parse_id(&id) {
        Some(id) => orchestrator.cancel(&id),
        None => CancelOutcome::NotFound,
    };

    let (status, message) = match outcome {
        CancelOutcome::Cancelled => (StatusCode::OK, "Execution cancelled successfully"),
        CancelOutcome::NotFound => (StatusCode::NOT_FOUND, "Execution not found"),
        CancelOutcome::AlreadyFinished => (
            StatusCode::BAD_REQUEST,
            "Execution already finished or cancelled",
        ),
        CancelOutcome::NoLiveProcess => (
            StatusCode::BAD_REQUEST,
            "Failed to cancel execution (process not found)",
        ),
    };

    let success = outcome == CancelOutcome::Cancelled;
    if !success {
        tracing::warn!("Failed to cancel execution {}: {}", id, message);
    }

    (
        status,
        Json(CancelResponse {
            success,
            message: message.to_string(),
        }),
    )
}
