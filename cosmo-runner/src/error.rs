//! Runner error types
//!
//! One enum per pipeline stage. None of these escape a job: the orchestrator
//! folds each of them into the job's terminal result.

use std::path::PathBuf;
use thiserror::Error;

/// Toolchain failures
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Compilation failed with {toolchain}")]
    Compilation { toolchain: String, log: String },

    #[error("Compilation succeeded but executable not found: {}", .0.display())]
    MissingExecutable(PathBuf),

    #[error("Build I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Compiler output, when the toolchain produced any
    pub fn log(&self) -> Option<&str> {
        match self {
            BuildError::Compilation { log, .. } => Some(log),
            _ => None,
        }
    }
}

/// Solver process failures
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Execution timeout after {0} seconds")]
    Timeout(u64),

    #[error("Fortran program exited with error code {0}. Check output for details.")]
    NonZeroExit(i32),

    #[error("Failed to start solver {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Solver I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Post-processing failures; never fatal to the job
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Data file not found for plotting: {0}")]
    DataMissing(String),

    #[error("Data file {name} is {age_secs}s older than the run, refusing to plot stale data")]
    StaleData { name: String, age_secs: u64 },

    #[error("Data file {0} is still empty")]
    EmptyData(String),

    #[error("No plotting interpreter could be started: {0}")]
    RendererUnavailable(String),

    #[error("Plot script failed with exit code {code}")]
    RendererFailed { code: i32, output: String },

    #[error("Plot image {0} was not produced")]
    ImageMissing(String),

    #[error("Plot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Artifact lookup failures
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Access denied")]
    OutsideOutputDir,

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}
