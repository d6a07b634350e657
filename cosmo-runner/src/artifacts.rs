//! Output directory management
//!
//! The solver writes its artifacts under fixed names into the shared work
//! directory. This module clears stale data before a run, collects what a
//! run produced, enforces the single-latest plot policy and serves files
//! back without ever leaving the directory.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ArtifactError;

/// Data files deleted before every run
pub const CLEANUP_FILES: [&str; 11] = [
    "n_prz_kmode.txt",
    "information.txt",
    "fields.txt",
    "n_epsilon_hubble.txt",
    "kmode.txt",
    "bardeen_initial.txt",
    "prslow.txt",
    "gw2.txt",
    "n_ps_kmode.txt",
    "m_o_k_ps.txt",
    "m_o_k_pt.txt",
];

/// Data files reported after a run, in this order
pub const COLLECTED_FILES: [&str; 7] = [
    "information.txt",
    "fields.txt",
    "n_epsilon_hubble.txt",
    "kmode.txt",
    "n_prz_kmode.txt",
    "prslow.txt",
    "gw2.txt",
];

/// Data file the plot is rendered from
pub const PLOT_DATA: &str = "n_prz_kmode.txt";

const PLOT_PREFIX: &str = "n_prz_kmode_plot_";
const PLOT_SUFFIX: &str = ".png";

/// First eight characters of a job id
pub fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Plot image name for a job, e.g. `n_prz_kmode_plot_1a2b3c4d.png`
pub fn plot_file_name(id: &Uuid) -> String {
    format!("{}{}{}", PLOT_PREFIX, short_id(id), PLOT_SUFFIX)
}

fn is_plot_file(name: &str) -> bool {
    name.starts_with(PLOT_PREFIX) && name.ends_with(PLOT_SUFFIX)
}

/// Content type served for an artifact name
pub fn content_type(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("txt") | Some("inc") | Some("f") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// A file read back from the output directory
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// The shared solver output directory
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    root: PathBuf,
}

impl OutputDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Deletes the data files of a previous run; plots are left alone
    ///
    /// Returns how many files were removed. Failures are logged only.
    pub async fn cleanup_data_files(&self) -> usize {
        let mut removed = 0;
        for name in CLEANUP_FILES {
            match tokio::fs::remove_file(self.path(name)).await {
                Ok(()) => {
                    debug!("Deleted old output file {}", name);
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete old output file {}: {}", name, e),
            }
        }
        if removed > 0 {
            info!("Cleaned up {} old data file(s)", removed);
        }
        removed
    }

    /// Names of the known data files currently present, in report order
    pub async fn collect(&self) -> Vec<String> {
        let mut found = Vec::new();
        for name in COLLECTED_FILES {
            match tokio::fs::metadata(self.path(name)).await {
                Ok(meta) if meta.is_file() => found.push(name.to_string()),
                _ => {}
            }
        }
        info!("Collected {} output file(s): {:?}", found.len(), found);
        found
    }

    /// Deletes every plot image except `keep`
    ///
    /// Returns how many images were removed.
    pub async fn retain_latest_plot(&self, keep: &str) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Error cleaning up old plots: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Error cleaning up old plots: {}", e);
                    break;
                }
            };

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !is_plot_file(name) || name == keep {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    info!("Deleted old plot file {}", name);
                    removed += 1;
                }
                Err(e) => warn!("Failed to delete old plot file {}: {}", name, e),
            }
        }

        if removed > 0 {
            info!("Cleaned up {} old plot file(s), keeping {}", removed, keep);
        }
        removed
    }

    /// Reads an artifact by name, confined to the output directory
    pub async fn fetch(&self, name: &str) -> Result<Artifact, ArtifactError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            warn!("Rejected artifact request outside the output directory");
            return Err(ArtifactError::OutsideOutputDir);
        }
        if name.trim().is_empty() {
            return Err(ArtifactError::NotFound(name.to_string()));
        }

        let root = canonical(&self.root, name).await?;
        let path = canonical(&self.root.join(relative), name).await?;

        if !path.starts_with(&root) {
            warn!("Rejected artifact request resolving outside the output directory");
            return Err(ArtifactError::OutsideOutputDir);
        }

        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(ArtifactError::NotFound(name.to_string()));
        }

        let bytes = tokio::fs::read(&path).await?;
        Ok(Artifact {
            name: name.to_string(),
            bytes,
            content_type: content_type(name),
        })
    }
}

async fn canonical(path: &Path, name: &str) -> Result<PathBuf, ArtifactError> {
    tokio::fs::canonicalize(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::NotFound(name.to_string())
        } else {
            ArtifactError::Io(e)
        }
    })
}
