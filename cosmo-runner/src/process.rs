//! Solver process capability
//!
//! Launches the compiled solver, streams its combined output into a shared
//! buffer and waits for it under a wall-clock bound and a kill token.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::RunError;

/// How long output readers may keep draining after the process is gone
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Combined stdout/stderr of a running solver
///
/// Cloning shares the same buffer, so a cancel request can snapshot the
/// partial output while the job task is still appending to it.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<String>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&self, line: &str) {
        let mut buffer = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        buffer.push_str(line);
        buffer.push('\n');
    }

    pub fn snapshot(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

const ALIVE: u8 = 0;
const EXITED: u8 = 1;
const KILL_CLAIMED: u8 = 2;

/// Whether a solver is still running, settled exactly once
///
/// The waiting task marks the process exited the moment it is reaped, while a
/// cancel request claims the kill. Whichever comes first wins.
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    state: Arc<AtomicU8>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the process is gone; `false` if a kill was claimed first
    pub fn mark_exited(&self) -> bool {
        self.settle(EXITED)
    }

    /// Claims the right to kill; `false` if the process already exited
    pub fn claim_kill(&self) -> bool {
        self.settle(KILL_CLAIMED)
    }

    pub fn has_exited(&self) -> bool {
        self.state.load(Ordering::SeqCst) == EXITED
    }

    fn settle(&self, to: u8) -> bool {
        self.state
            .compare_exchange(ALIVE, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// How a solver run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exited on its own; `None` when terminated by a signal
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
}

/// A launched solver binary
pub struct SolverProcess {
    child: Child,
    output: OutputBuffer,
    liveness: Liveness,
    readers: Vec<JoinHandle<()>>,
}

impl SolverProcess {
    /// Starts `program` without arguments in `work_dir`
    ///
    /// Every output line is appended to the buffer and logged with `label`
    /// as prefix.
    pub fn spawn(program: &Path, work_dir: &Path, label: &str) -> Result<Self, RunError> {
        info!("Executing: {}", program.display());

        let mut child = Command::new(program)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let output = OutputBuffer::new();
        let mut readers = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            readers.push(stream_lines(stdout, output.clone(), label.to_string()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(stream_lines(stderr, output.clone(), label.to_string()));
        }

        Ok(Self {
            child,
            output,
            liveness: Liveness::new(),
            readers,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn output(&self) -> OutputBuffer {
        self.output.clone()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Waits for exit, `timeout` or `cancel`, whichever comes first
    ///
    /// On timeout or cancellation the process is killed and reaped before
    /// returning. The process is marked exited before the output readers are
    /// drained.
    pub async fn wait(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessExit, RunError> {
        let exit = tokio::select! {
            status = self.child.wait() => ProcessExit::Exited(status?.code()),
            _ = tokio::time::sleep(timeout) => ProcessExit::TimedOut,
            _ = cancel.cancelled() => ProcessExit::Cancelled,
        };

        if !matches!(exit, ProcessExit::Exited(_)) {
            if let Err(e) = self.child.kill().await {
                warn!("Failed to kill solver process: {}", e);
            }
        }

        self.liveness.mark_exited();
        self.drain().await;
        Ok(exit)
    }

    /// Lets the readers pick up the tail of the output
    async fn drain(&mut self) {
        for reader in self.readers.drain(..) {
            let abort = reader.abort_handle();
            if tokio::time::timeout(DRAIN_TIMEOUT, reader).await.is_err() {
                abort.abort();
            }
        }
    }
}

fn stream_lines<R>(stream: R, output: OutputBuffer, label: String) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim_end_matches(['\n', '\r']);
                    info!("{}: {}", label, line);
                    output.push_line(line);
                }
                Err(e) => {
                    warn!("Error reading {} output: {}", label, e);
                    break;
                }
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Installs an executable script through a child `cp`
    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        let source = dir.join("solver.src");
        let path = dir.join("solver.sh");
        std::fs::write(&source, format!("#!/bin/sh\n{}", body)).unwrap();

        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg("cp \"$0\" \"$1\" && chmod 755 \"$1\"")
            .arg(&source)
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());
        path
    }

    #[tokio::test]
    async fn test_exit_code_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo out\necho err >&2\nexit 3\n");

        let mut process = SolverProcess::spawn(&program, dir.path(), "solver").unwrap();
        let exit = process
            .wait(Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, ProcessExit::Exited(Some(3)));
        let output = process.output().snapshot();
        assert!(output.contains("out\n"));
        assert!(output.contains("err\n"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo started\nexec sleep 30\n");

        let mut process = SolverProcess::spawn(&program, dir.path(), "solver").unwrap();
        let exit = process
            .wait(Duration::from_millis(300), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, ProcessExit::TimedOut);
        assert!(process.output().snapshot().contains("started"));
    }

    #[tokio::test]
    async fn test_cancel_token_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exec sleep 30\n");

        let mut process = SolverProcess::spawn(&program, dir.path(), "solver").unwrap();
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let exit = process.wait(Duration::from_secs(30), &token).await.unwrap();
        assert_eq!(exit, ProcessExit::Cancelled);
    }

    #[tokio::test]
    async fn test_marked_exited_before_output_closes() {
        let dir = tempfile::tempdir().unwrap();
        // The background sleep keeps both pipes open after the shell exits
        let program = script(dir.path(), "(sleep 5) &\necho done\nexit 0\n");

        let mut process = SolverProcess::spawn(&program, dir.path(), "solver").unwrap();
        let liveness = process.liveness();
        let waiter = tokio::spawn(async move {
            process
                .wait(Duration::from_secs(30), &CancellationToken::new())
                .await
        });

        let mut exited = false;
        for _ in 0..50 {
            if liveness.has_exited() {
                exited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(exited);
        assert!(!waiter.is_finished());
        assert!(!liveness.claim_kill());

        let exit = waiter.await.unwrap().unwrap();
        assert_eq!(exit, ProcessExit::Exited(Some(0)));
    }

    #[test]
    fn test_liveness_settles_once() {
        let liveness = Liveness::new();
        let shared = liveness.clone();

        assert!(shared.claim_kill());
        assert!(!liveness.mark_exited());
        assert!(!liveness.has_exited());

        let liveness = Liveness::new();
        assert!(liveness.mark_exited());
        assert!(!liveness.claim_kill());
        assert!(liveness.has_exited());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = SolverProcess::spawn(&dir.path().join("missing"), dir.path(), "solver");
        assert!(matches!(result, Err(RunError::Spawn { .. })));
    }
}
