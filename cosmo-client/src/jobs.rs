//! Calculation endpoints

use std::time::Duration;

use cosmo_core::dto::job::{CancelResponse, JobStatusResponse, SubmitJob, SubmitResponse};
use tokio::time::Instant;

use crate::SolverClient;
use crate::error::{ClientError, Result};

impl SolverClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a model for calculation
    ///
    /// Validation errors come back as a 400 [`ClientError::ApiError`] carrying
    /// the server's message.
    pub async fn submit(&self, req: &SubmitJob) -> Result<SubmitResponse> {
        let response = self
            .client
            .post(self.url("/calculate"))
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the status of an execution, including its result once finished
    pub async fn status(&self, execution_id: &str) -> Result<JobStatusResponse> {
        let url = self.url(&format!("/status/{}", execution_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a running execution
    pub async fn cancel(&self, execution_id: &str) -> Result<CancelResponse> {
        let url = self.url(&format!("/cancel/{}", execution_id));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Poll until the execution reaches a terminal status
    ///
    /// Gives up with [`ClientError::WaitTimeout`] once `timeout` has elapsed.
    pub async fn wait_for_completion(
        &self,
        execution_id: &str,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<JobStatusResponse> {
        let started = Instant::now();

        loop {
            let status = self.status(execution_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }

            if timeout.is_some_and(|limit| started.elapsed() >= limit) {
                return Err(ClientError::WaitTimeout(execution_id.to_string()));
            }

            tracing::debug!("Execution {} still {}", execution_id, status.status);
            tokio::time::sleep(interval).await;
        }
    }
}
