//! Plot post-processing
//!
//! Renders the final spectrum of a successful run into a PNG named after the
//! job, then deletes every older plot.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifacts::{OutputDirectory, PLOT_DATA, plot_file_name};
use crate::error::PlotError;

/// Data older than the run start by more than this is rejected
const STALE_TOLERANCE: Duration = Duration::from_secs(10);

/// Turns a data file into an image
#[async_trait]
pub trait PlotRenderer: Send + Sync {
    async fn render(&self, data: &Path, image: &Path) -> Result<(), PlotError>;
}

/// Runs the plotting script with the first interpreter that starts
#[derive(Debug, Clone)]
pub struct ScriptPlotRenderer {
    script: PathBuf,
    work_dir: PathBuf,
    interpreters: Vec<String>,
}

impl ScriptPlotRenderer {
    pub fn new(script: PathBuf, work_dir: PathBuf) -> Self {
        Self {
            script,
            work_dir,
            interpreters: vec!["python3".to_string(), "python".to_string()],
        }
    }

    pub fn with_interpreters(mut self, interpreters: Vec<String>) -> Self {
        self.interpreters = interpreters;
        self
    }
}

#[async_trait]
impl PlotRenderer for ScriptPlotRenderer {
    async fn render(&self, data: &Path, image: &Path) -> Result<(), PlotError> {
        if !self.script.is_file() {
            return Err(PlotError::RendererUnavailable(format!(
                "plot script not found: {}",
                self.script.display()
            )));
        }

        let mut failures = Vec::new();
        for interpreter in &self.interpreters {
            let result = Command::new(interpreter)
                .arg(&self.script)
                .arg(data)
                .arg(image)
                .current_dir(&self.work_dir)
                .stdin(Stdio::null())
                .output()
                .await;

            let out = match result {
                Ok(out) => out,
                Err(e) => {
                    debug!("Could not start {}: {}", interpreter, e);
                    failures.push(format!("{}: {}", interpreter, e));
                    continue;
                }
            };

            let stdout = String::from_utf8_lossy(&out.stdout);
            let stderr = String::from_utf8_lossy(&out.stderr);
            for line in stdout.lines().chain(stderr.lines()) {
                debug!("plot: {}", line);
            }

            if out.status.success() {
                return Ok(());
            }

            let code = out.status.code().unwrap_or(-1);
            error!("{} plot script failed with exit code {}", interpreter, code);
            return Err(PlotError::RendererFailed {
                code,
                output: format!("{}{}", stdout, stderr),
            });
        }

        Err(PlotError::RendererUnavailable(failures.join("; ")))
    }
}

/// Freshness checks, rendering and retention around a [`PlotRenderer`]
#[derive(Clone)]
pub struct PlotPipeline {
    outputs: OutputDirectory,
    renderer: Arc<dyn PlotRenderer>,
    retries: u32,
    retry_interval: Duration,
}

impl PlotPipeline {
    pub fn new(outputs: OutputDirectory, renderer: Arc<dyn PlotRenderer>) -> Self {
        Self {
            outputs,
            renderer,
            retries: 10,
            retry_interval: Duration::from_millis(500),
        }
    }

    pub fn with_retries(mut self, retries: u32, interval: Duration) -> Self {
        self.retries = retries;
        self.retry_interval = interval;
        self
    }

    /// Plots the data of the run started at `started_at`
    ///
    /// Returns the image name. Older plots are deleted only once the new
    /// image exists.
    pub async fn generate(&self, id: &Uuid, started_at: SystemTime) -> Result<String, PlotError> {
        let image_name = plot_file_name(id);
        let image = self.outputs.path(&image_name);
        let data = self.outputs.path(PLOT_DATA);

        if tokio::fs::remove_file(&image).await.is_ok() {
            info!("Deleted existing plot file {}", image_name);
        }

        let meta = match tokio::fs::metadata(&data).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PlotError::DataMissing(PLOT_DATA.to_string()));
            }
            Err(e) => return Err(PlotError::Io(e)),
        };

        check_fresh(&meta, started_at)?;

        if meta.len() == 0 {
            self.wait_for_data(&data).await?;
        }

        info!("Generating plot {} from {}", image_name, PLOT_DATA);
        self.renderer.render(&data, &image).await?;

        match tokio::fs::metadata(&image).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                info!("Plot generated: {} ({} bytes)", image_name, meta.len());
            }
            _ => return Err(PlotError::ImageMissing(image_name)),
        }

        self.outputs.retain_latest_plot(&image_name).await;
        Ok(image_name)
    }

    /// Re-polls a zero-length data file until the solver's writes land
    async fn wait_for_data(&self, data: &Path) -> Result<(), PlotError> {
        for attempt in 1..=self.retries {
            warn!(
                "{} is empty, waiting for data (attempt {}/{})",
                PLOT_DATA, attempt, self.retries
            );
            tokio::time::sleep(self.retry_interval).await;

            if tokio::fs::metadata(data).await?.len() > 0 {
                return Ok(());
            }
        }
        Err(PlotError::EmptyData(PLOT_DATA.to_string()))
    }
}

fn check_fresh(meta: &std::fs::Metadata, started_at: SystemTime) -> Result<(), PlotError> {
    let Ok(modified) = meta.modified() else {
        return Ok(());
    };
    let Some(threshold) = started_at.checked_sub(STALE_TOLERANCE) else {
        return Ok(());
    };

    if modified < threshold {
        let age_secs = started_at
            .duration_since(modified)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        error!(
            "{} predates this run by {}s, it belongs to an earlier calculation",
            PLOT_DATA, age_secs
        );
        return Err(PlotError::StaleData {
            name: PLOT_DATA.to_string(),
            age_secs,
        });
    }
    Ok(())
}
