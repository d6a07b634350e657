//! Job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle record
///
/// Owned by the runner's job store. Once `status` is terminal the record is
/// never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub result: Option<ExecutionResult>,
}

impl Job {
    /// Creates a freshly submitted job
    pub fn submitted(id: Uuid) -> Self {
        Self {
            id,
            status: JobStatus::Submitted,
            submitted_at: chrono::Utc::now(),
            finished_at: None,
            result: None,
        }
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the status is final
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub success: bool,
    pub message: String,
    /// Raw combined stdout/stderr of the solver, when a process was started
    pub output: Option<String>,
    /// Names of the artifacts found in the output directory, in collection order
    pub output_files: Vec<String>,
}

impl ExecutionResult {
    pub fn success(
        execution_id: Uuid,
        message: impl Into<String>,
        output: Option<String>,
        output_files: Vec<String>,
    ) -> Self {
        Self {
            execution_id,
            success: true,
            message: message.into(),
            output,
            output_files,
        }
    }

    pub fn failure(
        execution_id: Uuid,
        message: impl Into<String>,
        output: Option<String>,
        output_files: Vec<String>,
    ) -> Self {
        Self {
            execution_id,
            success: false,
            message: message.into(),
            output,
            output_files,
        }
    }
}
