//! Job store
//!
//! Concurrent map from job id to its lifecycle record. The only way out of a
//! non-terminal state is [`JobStore::finish`], a compare-and-set that refuses
//! to touch a job that already reached a terminal status.

use cosmo_core::domain::job::{ExecutionResult, Job, JobStatus};
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: DashMap<Uuid, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly accepted job as running
    pub fn insert_running(&self, id: Uuid) -> Job {
        let mut job = Job::submitted(id);
        job.status = JobStatus::Running;
        self.jobs.insert(id, job.clone());
        job
    }

    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }

    /// Moves a job into a terminal state
    ///
    /// Returns `false` without changing anything when the job is unknown or
    /// already terminal.
    pub fn finish(&self, id: &Uuid, status: JobStatus, result: ExecutionResult) -> bool {
        debug_assert!(status.is_terminal());

        let Some(mut job) = self.jobs.get_mut(id) else {
            return false;
        };
        if job.status.is_terminal() {
            return false;
        }

        job.status = status;
        job.finished_at = Some(chrono::Utc::now());
        job.result = Some(result);
        true
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
