//! Build pipeline
//!
//! Compiles the prepared solver source with the primary toolchain and, when
//! that fails, with the fallback one.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::BuildError;

/// A compiler command line, e.g. `ifx` or `gfortran -O2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    command: String,
}

impl Toolchain {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Runs `<toolchain> -o <output> <source>` in `work_dir`
    ///
    /// Returns the combined compiler output, as the error when the toolchain
    /// could not be started or exited non-zero.
    async fn run(&self, work_dir: &Path, source: &Path, output: &Path) -> Result<String, String> {
        let mut parts = self.command.split_whitespace();
        let Some(program) = parts.next() else {
            return Err("empty toolchain command".to_string());
        };

        info!(
            "Running: {} -o {} {}",
            self.command,
            output.display(),
            source.display()
        );

        let result = Command::new(program)
            .args(parts)
            .arg("-o")
            .arg(output)
            .arg(source)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) => return Err(format!("failed to start {}: {}", self.command, e)),
        };

        let mut log = String::from_utf8_lossy(&out.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&out.stderr));

        if out.status.success() {
            Ok(log)
        } else {
            let code = out.status.code().unwrap_or(-1);
            Err(format!("{} exited with code {}\n{}", self.command, code, log))
        }
    }
}

impl std::fmt::Display for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command)
    }
}

/// Primary toolchain with an optional fallback
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    work_dir: PathBuf,
    primary: Toolchain,
    fallback: Option<Toolchain>,
}

impl BuildPipeline {
    pub fn new(work_dir: PathBuf, primary: Toolchain, fallback: Option<Toolchain>) -> Self {
        let fallback = fallback.filter(|f| f != &primary);
        Self {
            work_dir,
            primary,
            fallback,
        }
    }

    /// Compiles `source` into `output`, returning the toolchain that succeeded
    pub async fn compile(&self, source: &Path, output: &Path) -> Result<Toolchain, BuildError> {
        match tokio::fs::remove_file(output).await {
            Ok(()) => info!("Deleted old executable {}", output.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::Io(e)),
        }

        let toolchain = match self.primary.run(&self.work_dir, source, output).await {
            Ok(log) => {
                log_compiler_output(&self.primary, &log);
                self.primary.clone()
            }
            Err(primary_log) => {
                let Some(fallback) = &self.fallback else {
                    return Err(BuildError::Compilation {
                        toolchain: self.primary.to_string(),
                        log: primary_log,
                    });
                };

                warn!(
                    "{} compilation failed, falling back to {}: {}",
                    self.primary,
                    fallback,
                    primary_log.trim()
                );

                match fallback.run(&self.work_dir, source, output).await {
                    Ok(log) => {
                        log_compiler_output(fallback, &log);
                        fallback.clone()
                    }
                    Err(fallback_log) => {
                        return Err(BuildError::Compilation {
                            toolchain: fallback.to_string(),
                            log: format!("{}\n{}", primary_log, fallback_log),
                        });
                    }
                }
            }
        };

        if !output.is_file() {
            return Err(BuildError::MissingExecutable(output.to_path_buf()));
        }

        info!(
            "Compilation successful (toolchain: {}). Executable: {}",
            toolchain,
            output.display()
        );
        Ok(toolchain)
    }
}

fn log_compiler_output(toolchain: &Toolchain, log: &str) {
    for line in log.lines().filter(|l| !l.trim().is_empty()) {
        info!("{}: {}", toolchain, line);
    }
}
