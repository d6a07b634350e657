//! Job orchestrator
//!
//! Drives one submission through code generation, compilation, the solver
//! run and post-processing. Submission returns as soon as the input is
//! validated; the rest happens on a task gated by a semaphore, and the
//! outcome lands in the job store.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use anyhow::{Context, Result};
use cosmo_codegen::{GeneratedSources, prepare_file};
use cosmo_core::domain::job::{ExecutionResult, Job, JobStatus};
use cosmo_core::domain::model::{ModelInput, ValidationError};
use cosmo_core::dto::job::SubmitJob;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifacts::{Artifact, OutputDirectory, short_id};
use crate::config::RunnerConfig;
use crate::error::{ArtifactError, RunError};
use crate::plot::{PlotPipeline, PlotRenderer, ScriptPlotRenderer};
use crate::process::{ProcessExit, SolverProcess};
use crate::registry::{ExecutionRegistry, ProcessHandle};
use crate::store::JobStore;
use crate::toolchain::{BuildPipeline, Toolchain};
use crate::validation::validate_request;

/// Result of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
    /// The job was terminal, or its process exited while the request ran
    AlreadyFinished,
    /// The job is running but has no solver process yet
    NoLiveProcess,
}

/// Owns the job store, the execution registry and the worker pool
#[derive(Clone)]
pub struct JobOrchestrator {
    config: Arc<RunnerConfig>,
    store: Arc<JobStore>,
    registry: Arc<ExecutionRegistry>,
    semaphore: Arc<Semaphore>,
    builder: Arc<BuildPipeline>,
    outputs: OutputDirectory,
    plots: PlotPipeline,
}

impl JobOrchestrator {
    /// Creates an orchestrator that plots with the configured script
    pub fn new(config: RunnerConfig) -> Self {
        let renderer = ScriptPlotRenderer::new(config.plot_script_path(), config.work_dir.clone());
        Self::with_renderer(config, Arc::new(renderer))
    }

    pub fn with_renderer(config: RunnerConfig, renderer: Arc<dyn PlotRenderer>) -> Self {
        let outputs = OutputDirectory::new(config.work_dir.clone());
        let plots = PlotPipeline::new(outputs.clone(), renderer)
            .with_retries(config.plot_retries, config.plot_retry_interval);
        let builder = BuildPipeline::new(
            config.work_dir.clone(),
            Toolchain::new(config.compiler.clone()),
            config.fallback_compiler.clone().map(Toolchain::new),
        );

        Self {
            semaphore: Arc::new(Semaphore::new(config.max_parallel_jobs)),
            config: Arc::new(config),
            store: Arc::new(JobStore::new()),
            registry: Arc::new(ExecutionRegistry::new()),
            builder: Arc::new(builder),
            outputs,
            plots,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.registry
    }

    /// Validates the request and starts the job in the background
    ///
    /// Must be called from within a Tokio runtime. On error no job exists.
    pub fn submit(&self, request: SubmitJob) -> Result<Uuid, ValidationError> {
        let model = validate_request(request)?;

        let id = Uuid::new_v4();
        self.store.insert_running(id);
        info!(
            "Accepted execution {} ({} field(s))",
            id,
            model.fields.field_count()
        );

        let this = self.clone();
        tokio::spawn(this.drive(id, model));

        Ok(id)
    }

    /// Current record of a job
    pub fn status(&self, id: &Uuid) -> Option<Job> {
        self.store.get(id)
    }

    /// Kills a running job's solver and marks the job cancelled
    pub fn cancel(&self, id: &Uuid) -> CancelOutcome {
        let Some(job) = self.store.get(id) else {
            return CancelOutcome::NotFound;
        };
        if job.status.is_terminal() {
            return CancelOutcome::AlreadyFinished;
        }

        let Some(handle) = self.registry.remove(id) else {
            warn!("Cancel requested for {} but no live process is registered", id);
            return CancelOutcome::NoLiveProcess;
        };
        if !handle.claim_kill() {
            debug!("Execution {} exited before it could be cancelled", id);
            return CancelOutcome::AlreadyFinished;
        }

        let result = ExecutionResult::failure(
            *id,
            "Execution cancelled",
            Some(handle.output.snapshot()),
            Vec::new(),
        );
        if !self.store.finish(id, JobStatus::Cancelled, result) {
            handle.kill.cancel();
            return CancelOutcome::AlreadyFinished;
        }

        handle.kill.cancel();
        info!("Cancelled execution {} (pid {:?})", id, handle.pid);
        CancelOutcome::Cancelled
    }

    /// Reads an artifact from the output directory
    pub async fn fetch_artifact(&self, name: &str) -> Result<Artifact, ArtifactError> {
        self.outputs.fetch(name).await
    }

    /// Waits for a worker slot, runs the job and settles unexpected failures
    async fn drive(self, id: Uuid, model: ModelInput) {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Worker pool unavailable for {}: {}", id, e);
                self.settle(id, JobStatus::Failed, failure(id, format!("Error: {}", e)));
                return;
            }
        };

        let worker = self.clone();
        let outcome = tokio::spawn(async move { worker.execute(id, model).await }).await;
        drop(permit);

        let message = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                error!("Execution {} failed: {:#}", id, e);
                format!("Error: {:#}", e)
            }
            Err(e) => {
                error!("Execution task {} panicked: {}", id, e);
                "Error: execution task aborted unexpectedly".to_string()
            }
        };

        let output = self.registry.remove(&id).map(|handle| {
            handle.kill.cancel();
            handle.output.snapshot()
        });
        self.settle(
            id,
            JobStatus::Failed,
            ExecutionResult::failure(id, message, output, Vec::new()),
        );
    }

    /// Generate, compile, run, collect
    async fn execute(&self, id: Uuid, model: ModelInput) -> Result<()> {
        let started_at = SystemTime::now();
        let clock = Instant::now();
        let work_dir = self.config.work_dir.clone();

        info!("Starting execution {}", id);

        if !work_dir.is_dir() {
            let message = format!("Fortran directory does not exist: {}", work_dir.display());
            error!("{}", message);
            self.settle(id, JobStatus::Failed, failure(id, message));
            return Ok(());
        }

        self.outputs.cleanup_data_files().await;

        let tuning = model.tuning;
        info!(
            "Tuning: initial_time={}, time_step={}, kstar={}, cq={}",
            tuning.initial_time, tuning.time_step, tuning.kstar, tuning.cq
        );

        GeneratedSources::generate(&model)
            .write_to(&work_dir)
            .context("Failed to write include files")?;

        let field_count = model.fields.field_count();
        info!("Number of fields (nf): {}", field_count);

        let source = match prepare_file(&self.config.template_path(), field_count) {
            Ok(source) => source,
            Err(e) => {
                error!("Source preparation failed: {}", e);
                let message = format!("Compilation failed: {}", e);
                self.settle(id, JobStatus::Failed, failure(id, message));
                return Ok(());
            }
        };

        let exe = self.config.exe_path();
        if let Err(e) = self.builder.compile(&source, &exe).await {
            error!("{}", e);
            let result = ExecutionResult::failure(
                id,
                format!("Compilation failed: {}", e),
                e.log().map(str::to_string),
                Vec::new(),
            );
            self.settle(id, JobStatus::Failed, result);
            return Ok(());
        }
        info!("Compiled in {:.1}s", clock.elapsed().as_secs_f64());

        let mut process = match SolverProcess::spawn(&exe, &work_dir, &self.config.exe_name) {
            Ok(process) => process,
            Err(e) => {
                error!("{}", e);
                self.settle(id, JobStatus::Failed, failure(id, format!("Error: {}", e)));
                return Ok(());
            }
        };

        let handle = ProcessHandle::new(process.pid(), process.output(), process.liveness());
        self.registry.register(id, handle.clone());

        let exit = process.wait(self.config.job_timeout, &handle.kill).await;
        self.registry.remove(&id);
        let output = process.output().snapshot();

        match exit {
            Ok(ProcessExit::Exited(code)) => {
                let code = code.unwrap_or(-1);
                info!(
                    "Solver exited with code {} after {:.1}s (compile + run)",
                    code,
                    clock.elapsed().as_secs_f64()
                );
                self.complete(id, code, output, started_at).await;
            }
            Ok(ProcessExit::TimedOut) => {
                let err = RunError::Timeout(self.config.job_timeout.as_secs());
                error!("Execution {}: {}", id, err);
                self.settle(
                    id,
                    JobStatus::Failed,
                    ExecutionResult::failure(id, err.to_string(), Some(output), Vec::new()),
                );
            }
            Ok(ProcessExit::Cancelled) => {
                let result =
                    ExecutionResult::failure(id, "Execution cancelled", Some(output), Vec::new());
                self.settle(id, JobStatus::Cancelled, result);
            }
            Err(e) => {
                error!("Execution {}: {}", id, e);
                self.settle(
                    id,
                    JobStatus::Failed,
                    ExecutionResult::failure(id, format!("Error: {}", e), Some(output), Vec::new()),
                );
            }
        }

        Ok(())
    }

    /// Collects artifacts of a finished run and records its outcome
    async fn complete(&self, id: Uuid, code: i32, output: String, started_at: SystemTime) {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let mut files = self.outputs.collect().await;

        if code != 0 {
            let err = RunError::NonZeroExit(code);
            error!("{}", err);
            let result = ExecutionResult::failure(id, err.to_string(), Some(output), files);
            self.settle(id, JobStatus::Failed, result);
            return;
        }

        let plot_error = match self.plots.generate(&id, started_at).await {
            Ok(image) => {
                files.push(image);
                None
            }
            Err(e) => {
                error!("Failed to generate plot: {}", e);
                Some(e)
            }
        };

        let mut message = format!(
            "Calculation completed successfully! Generated {} output file(s). Execution ID: {}...",
            files.len(),
            short_id(&id)
        );
        if let Some(e) = plot_error {
            message.push_str(&format!(" Plot generation failed: {}", e));
        }

        info!("{}", message);
        self.settle(
            id,
            JobStatus::Completed,
            ExecutionResult::success(id, message, Some(output), files),
        );
    }

    fn settle(&self, id: Uuid, status: JobStatus, result: ExecutionResult) {
        if !self.store.finish(&id, status, result) {
            debug!(
                "Execution {} already reached a terminal state, dropping {} result",
                id, status
            );
        }
    }
}

fn failure(id: Uuid, message: String) -> ExecutionResult {
    ExecutionResult::failure(id, message, None, Vec::new())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::PlotError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    const TEMPLATE: &str = "      program multifix\n      integer, parameter :: nf = 1\n      end\n";

    const SOLVER_OK: &str = "echo solving\nprintf '1 2\\n' > n_prz_kmode.txt\nprintf 'info\\n' > information.txt\n";
    const SOLVER_FAIL: &str = "echo boom\nexit 2\n";
    const SOLVER_HANG: &str = "echo started\nexec sleep 30\n";
    /// Exits at once while a background child keeps the output pipes open
    const SOLVER_LINGERING: &str = "printf '1 2\\n' > n_prz_kmode.txt\n(sleep 5) &\necho done\nexit 0\n";

    struct FakeRenderer(&'static [u8]);

    #[async_trait]
    impl PlotRenderer for FakeRenderer {
        async fn render(&self, _data: &Path, image: &Path) -> Result<(), PlotError> {
            tokio::fs::write(image, self.0).await?;
            Ok(())
        }
    }

    /// A fake toolchain that "compiles" by writing `solver` as a script
    fn fake_compiler(dir: &Path, solver: &str) -> String {
        let script = dir.join("fakefc.sh");
        std::fs::write(
            &script,
            format!(
                "echo compiling \"$3\"\ncat > \"$2\" <<'SOLVER'\n#!/bin/sh\n{}SOLVER\nchmod 755 \"$2\"\n",
                solver
            ),
        )
        .unwrap();
        format!("sh {}", script.display())
    }

    fn orchestrator(dir: &Path, solver: &str, timeout: Duration) -> JobOrchestrator {
        std::fs::write(dir.join("multifix.f"), TEMPLATE).unwrap();

        let mut config = RunnerConfig::new(dir.to_path_buf());
        config.compiler = fake_compiler(dir, solver);
        config.fallback_compiler = None;
        config.job_timeout = timeout;
        config.settle_delay = Duration::ZERO;
        config.plot_retries = 2;
        config.plot_retry_interval = Duration::from_millis(10);

        JobOrchestrator::with_renderer(config, Arc::new(FakeRenderer(b"\x89PNG")))
    }

    fn request() -> SubmitJob {
        SubmitJob {
            potential_expression: Some("(0.1*Tanh(x(1)/Sqrt(6)))**2".to_string()),
            field_values: Some(vec![6.33]),
            field_velocities: Some(vec![0.0]),
            ..SubmitJob::default()
        }
    }

    async fn wait_terminal(orchestrator: &JobOrchestrator, id: &Uuid) -> Job {
        for _ in 0..500 {
            let job = orchestrator.status(id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {} did not finish", id);
    }

    async fn wait_registered(orchestrator: &JobOrchestrator, id: &Uuid) {
        for _ in 0..500 {
            if orchestrator.registry().contains(id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {} never started its solver", id);
    }

    fn plot_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("n_prz_kmode_plot_"))
            .collect()
    }

    #[tokio::test]
    async fn test_successful_run() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_OK, Duration::from_secs(30));

        let id = orchestrator.submit(request()).unwrap();
        let job = wait_terminal(&orchestrator, &id).await;
        let result = job.result.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(result.success);
        assert!(
            result
                .message
                .starts_with("Calculation completed successfully! Generated 3 output file(s).")
        );
        assert!(result.message.ends_with(&format!("{}...", short_id(&id))));
        assert_eq!(
            result.output_files,
            vec![
                "information.txt".to_string(),
                "n_prz_kmode.txt".to_string(),
                crate::artifacts::plot_file_name(&id),
            ]
        );
        assert!(result.output.unwrap().contains("solving"));
        assert!(orchestrator.registry().is_empty());

        let potential = std::fs::read_to_string(dir.path().join("potential.inc")).unwrap();
        assert!(potential.starts_with("      VV=       (0.1d0*Tanh(x(1)/Sqrt(6.d0)))**2.d0"));
        let prepared = std::fs::read_to_string(dir.path().join("multifix_prepared.f")).unwrap();
        assert!(prepared.contains("nf = 1"));
    }

    #[tokio::test]
    async fn test_sequential_runs_keep_one_plot() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_OK, Duration::from_secs(30));

        let first = orchestrator.submit(request()).unwrap();
        wait_terminal(&orchestrator, &first).await;
        let second = orchestrator.submit(request()).unwrap();
        let job = wait_terminal(&orchestrator, &second).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            plot_files(dir.path()),
            vec![crate::artifacts::plot_file_name(&second)]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_FAIL, Duration::from_secs(30));

        let id = orchestrator.submit(request()).unwrap();
        let job = wait_terminal(&orchestrator, &id).await;
        let result = job.result.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            result.message,
            "Fortran program exited with error code 2. Check output for details."
        );
        assert!(result.output.unwrap().contains("boom"));
        assert!(plot_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_HANG, Duration::from_secs(1));

        let id = orchestrator.submit(request()).unwrap();
        let job = wait_terminal(&orchestrator, &id).await;
        let result = job.result.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(result.message, "Execution timeout after 1 seconds");
        assert!(result.output.unwrap().contains("started"));
        assert!(!orchestrator.registry().contains(&id));
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_HANG, Duration::from_secs(30));

        let id = orchestrator.submit(request()).unwrap();
        wait_registered(&orchestrator, &id).await;

        assert_eq!(orchestrator.cancel(&id), CancelOutcome::Cancelled);
        assert!(!orchestrator.registry().contains(&id));

        let job = orchestrator.status(&id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.result.unwrap().message, "Execution cancelled");

        // The job task observes the kill but must not overwrite the outcome
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(orchestrator.status(&id).unwrap().status, JobStatus::Cancelled);
        assert_eq!(orchestrator.cancel(&id), CancelOutcome::AlreadyFinished);
    }

    #[tokio::test]
    async fn test_cancel_unknown_and_finished() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_FAIL, Duration::from_secs(30));

        assert_eq!(orchestrator.cancel(&Uuid::new_v4()), CancelOutcome::NotFound);

        let id = orchestrator.submit(request()).unwrap();
        wait_terminal(&orchestrator, &id).await;
        assert_eq!(orchestrator.cancel(&id), CancelOutcome::AlreadyFinished);
    }

    #[tokio::test]
    async fn test_cancel_before_solver_starts() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_OK, Duration::from_secs(30));

        let starting = Uuid::new_v4();
        orchestrator.store().insert_running(starting);
        assert_eq!(orchestrator.cancel(&starting), CancelOutcome::NoLiveProcess);
        assert_eq!(
            orchestrator.status(&starting).unwrap().status,
            JobStatus::Running
        );
    }

    #[tokio::test]
    async fn test_cancel_after_solver_exited() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_LINGERING, Duration::from_secs(30));

        let id = orchestrator.submit(request()).unwrap();
        wait_registered(&orchestrator, &id).await;
        let handle = orchestrator.registry().get(&id).unwrap();

        // The solver is gone but the job task is still draining its output
        let mut exited = false;
        for _ in 0..100 {
            if handle.has_exited() {
                exited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(exited);
        assert_eq!(orchestrator.status(&id).unwrap().status, JobStatus::Running);

        assert_eq!(orchestrator.cancel(&id), CancelOutcome::AlreadyFinished);
        assert!(!orchestrator.registry().contains(&id));
        assert!(!handle.kill.is_cancelled());

        let job = wait_terminal(&orchestrator, &id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.unwrap().success);
    }

    #[tokio::test]
    async fn test_validation_creates_no_job() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_OK, Duration::from_secs(30));

        let mut bad = request();
        bad.field_values = Some(vec![1.0, 2.0]);
        bad.field_velocities = Some(vec![1.0]);

        assert!(matches!(
            orchestrator.submit(bad),
            Err(ValidationError::LengthMismatch { .. })
        ));
        assert!(orchestrator.store().is_empty());
        assert!(orchestrator.status(&Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_compilation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_OK, Duration::from_secs(30));
        std::fs::write(dir.path().join("fakefc.sh"), "echo 'error #6404' >&2\nexit 1\n").unwrap();

        let id = orchestrator.submit(request()).unwrap();
        let job = wait_terminal(&orchestrator, &id).await;
        let result = job.result.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(result.message.starts_with("Compilation failed"));
        assert!(result.output.unwrap().contains("error #6404"));
    }

    #[tokio::test]
    async fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), SOLVER_OK, Duration::from_secs(30));
        std::fs::remove_file(dir.path().join("multifix.f")).unwrap();

        let id = orchestrator.submit(request()).unwrap();
        let job = wait_terminal(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(
            job.result
                .unwrap()
                .message
                .starts_with("Compilation failed: Solver template not found")
        );
    }

    #[tokio::test]
    async fn test_plot_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunnerConfig::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join("multifix.f"), TEMPLATE).unwrap();
        config.compiler = fake_compiler(dir.path(), SOLVER_OK);
        config.fallback_compiler = None;
        config.settle_delay = Duration::ZERO;
        std::fs::write(dir.path().join("n_prz_kmode_plot_00000000.png"), "old").unwrap();

        let orchestrator = JobOrchestrator::with_renderer(config, Arc::new(FakeRenderer(b"")));
        let id = orchestrator.submit(request()).unwrap();
        let job = wait_terminal(&orchestrator, &id).await;
        let result = job.result.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(result.message.contains("Generated 2 output file(s)"));
        assert!(result.message.contains("Plot generation failed"));
        assert_eq!(plot_files(dir.path()), vec!["n_prz_kmode_plot_00000000.png"]);
    }
}
