//! Cosmo Runner
//!
//! Executes solver jobs against a shared work directory.
//!
//! This crate contains:
//! - Configuration loaded from the environment
//! - The build pipeline (primary and fallback Fortran toolchains)
//! - The solver process capability with timeout and kill token
//! - Job store, execution registry and the job orchestrator
//! - Output collection, artifact serving and plot post-processing

pub mod artifacts;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plot;
pub mod process;
pub mod registry;
pub mod store;
pub mod toolchain;
pub mod validation;

pub use artifacts::{Artifact, OutputDirectory};
pub use config::RunnerConfig;
pub use error::{ArtifactError, BuildError, PlotError, RunError};
pub use orchestrator::{CancelOutcome, JobOrchestrator};
pub use plot::{PlotPipeline, PlotRenderer, ScriptPlotRenderer};
