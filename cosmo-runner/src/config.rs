//! Runner configuration
//!
//! Defines the solver work directory, the toolchains used to build the
//! prepared source, and the limits applied to each job.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runner configuration
///
/// Every knob can be overridden through a `COSMO_*` environment variable.
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Shared directory holding the template, generated includes and artifacts
    pub work_dir: PathBuf,

    /// Template file name inside `work_dir`
    pub template: String,

    /// Primary toolchain command line (e.g., "ifx")
    pub compiler: String,

    /// Toolchain tried when the primary one fails; `None` disables the fallback
    pub fallback_compiler: Option<String>,

    /// Name of the compiled solver binary inside `work_dir`
    pub exe_name: String,

    /// Wall-clock bound on one solver run, measured from process start
    pub job_timeout: Duration,

    /// Max jobs driven through the pipeline at once
    pub max_parallel_jobs: usize,

    /// Plotting script inside `work_dir`
    pub plot_script: String,

    /// Pause between solver exit and artifact collection
    pub settle_delay: Duration,

    /// How many times an empty data file is re-polled before plotting
    pub plot_retries: u32,

    /// Interval between those re-polls
    pub plot_retry_interval: Duration,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults for the given work directory
    pub fn new(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            template: "multifix.f".to_string(),
            compiler: "ifx".to_string(),
            fallback_compiler: Some("gfortran".to_string()),
            exe_name: "multifix".to_string(),
            job_timeout: Duration::from_secs(1200), // 20 minutes
            max_parallel_jobs: 1,
            plot_script: "plot_results.py".to_string(),
            settle_delay: Duration::from_millis(500),
            plot_retries: 10,
            plot_retry_interval: Duration::from_millis(500),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables:
    /// - COSMO_WORK_DIR (default: ../fortran if it exists, else ./fortran)
    /// - COSMO_TEMPLATE (default: multifix.f)
    /// - COSMO_FORTRAN_COMPILER (default: ifx)
    /// - COSMO_FORTRAN_FALLBACK (default: gfortran, empty disables)
    /// - COSMO_FORTRAN_EXE_NAME (default: multifix)
    /// - COSMO_JOB_TIMEOUT (seconds, default: 1200)
    /// - COSMO_MAX_PARALLEL_JOBS (default: 1)
    /// - COSMO_PLOT_SCRIPT (default: plot_results.py)
    /// - COSMO_SETTLE_DELAY_MS (default: 500)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let work_dir = lookup("COSMO_WORK_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_work_dir);

        let mut config = Self::new(work_dir);

        if let Some(template) = lookup("COSMO_TEMPLATE").filter(|s| !s.trim().is_empty()) {
            config.template = template;
        }

        if let Some(compiler) = lookup("COSMO_FORTRAN_COMPILER").filter(|s| !s.trim().is_empty()) {
            config.compiler = compiler;
        }

        if let Some(fallback) = lookup("COSMO_FORTRAN_FALLBACK") {
            config.fallback_compiler = Some(fallback).filter(|s| !s.trim().is_empty());
        }

        if let Some(exe_name) = lookup("COSMO_FORTRAN_EXE_NAME").filter(|s| !s.trim().is_empty()) {
            config.exe_name = exe_name;
        }

        if let Some(timeout) = lookup("COSMO_JOB_TIMEOUT").and_then(|s| s.parse::<u64>().ok()) {
            config.job_timeout = Duration::from_secs(timeout);
        }

        if let Some(max) = lookup("COSMO_MAX_PARALLEL_JOBS").and_then(|s| s.parse::<usize>().ok()) {
            config.max_parallel_jobs = max;
        }

        if let Some(script) = lookup("COSMO_PLOT_SCRIPT").filter(|s| !s.trim().is_empty()) {
            config.plot_script = script;
        }

        if let Some(delay) = lookup("COSMO_SETTLE_DELAY_MS").and_then(|s| s.parse::<u64>().ok()) {
            config.settle_delay = Duration::from_millis(delay);
        }

        config
    }

    pub fn template_path(&self) -> PathBuf {
        self.work_dir.join(&self.template)
    }

    pub fn exe_path(&self) -> PathBuf {
        self.work_dir.join(&self.exe_name)
    }

    pub fn plot_script_path(&self) -> PathBuf {
        self.work_dir.join(&self.plot_script)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.compiler.trim().is_empty() {
            anyhow::bail!("compiler cannot be empty");
        }

        if self.exe_name.trim().is_empty() || self.exe_name.contains(['/', '\\']) {
            anyhow::bail!("exe_name must be a plain file name");
        }

        if self.template.trim().is_empty() {
            anyhow::bail!("template cannot be empty");
        }

        if self.job_timeout.is_zero() {
            anyhow::bail!("job_timeout must be greater than 0");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(default_work_dir())
    }
}

/// `../fortran` when launched from a sibling directory, else `./fortran`
fn default_work_dir() -> PathBuf {
    let sibling = Path::new("..").join("fortran");
    if sibling.is_dir() {
        sibling
    } else {
        Path::new(".").join("fortran")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::new(PathBuf::from("/srv/fortran"));
        assert_eq!(config.compiler, "ifx");
        assert_eq!(config.fallback_compiler.as_deref(), Some("gfortran"));
        assert_eq!(config.job_timeout, Duration::from_secs(1200));
        assert_eq!(config.max_parallel_jobs, 1);
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.template_path(), PathBuf::from("/srv/fortran/multifix.f"));
        assert_eq!(config.exe_path(), PathBuf::from("/srv/fortran/multifix"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("COSMO_WORK_DIR", "/tmp/solver"),
            ("COSMO_FORTRAN_COMPILER", "gfortran -O2"),
            ("COSMO_FORTRAN_FALLBACK", ""),
            ("COSMO_JOB_TIMEOUT", "60"),
            ("COSMO_MAX_PARALLEL_JOBS", "4"),
            ("COSMO_SETTLE_DELAY_MS", "0"),
        ]));

        assert_eq!(config.work_dir, PathBuf::from("/tmp/solver"));
        assert_eq!(config.compiler, "gfortran -O2");
        assert_eq!(config.fallback_compiler, None);
        assert_eq!(config.job_timeout, Duration::from_secs(60));
        assert_eq!(config.max_parallel_jobs, 4);
        assert_eq!(config.settle_delay, Duration::ZERO);
    }

    #[test]
    fn test_unparseable_values_keep_defaults() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("COSMO_WORK_DIR", "/tmp/solver"),
            ("COSMO_JOB_TIMEOUT", "soon"),
            ("COSMO_MAX_PARALLEL_JOBS", "-1"),
        ]));

        assert_eq!(config.job_timeout, Duration::from_secs(1200));
        assert_eq!(config.max_parallel_jobs, 1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunnerConfig::new(PathBuf::from("/tmp"));
        assert!(config.validate().is_ok());

        config.compiler = "  ".to_string();
        assert!(config.validate().is_err());
        config.compiler = "ifx".to_string();

        config.exe_name = "bin/multifix".to_string();
        assert!(config.validate().is_err());
        config.exe_name = "multifix".to_string();

        config.max_parallel_jobs = 0;
        assert!(config.validate().is_err());
        config.max_parallel_jobs = 1;

        config.job_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
