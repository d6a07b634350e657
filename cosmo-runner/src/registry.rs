//! Execution registry
//!
//! Maps a job id to the handle of its live solver process. A handle is
//! registered once the process has started and removed as soon as the job
//! stops owning a live process.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::process::{Liveness, OutputBuffer};

/// Control handle of a running solver
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub pid: Option<u32>,
    /// Cancelling this token kills the process
    pub kill: CancellationToken,
    pub output: OutputBuffer,
    liveness: Liveness,
}

impl ProcessHandle {
    pub fn new(pid: Option<u32>, output: OutputBuffer, liveness: Liveness) -> Self {
        Self {
            pid,
            kill: CancellationToken::new(),
            output,
            liveness,
        }
    }

    /// Claims the kill unless the process already exited on its own
    pub fn claim_kill(&self) -> bool {
        self.liveness.claim_kill()
    }

    pub fn has_exited(&self) -> bool {
        self.liveness.has_exited()
    }
}

/// Concurrent job id → live process map
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    handles: DashMap<Uuid, ProcessHandle>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: Uuid, handle: ProcessHandle) {
        self.handles.insert(id, handle);
    }

    pub fn get(&self, id: &Uuid) -> Option<ProcessHandle> {
        self.handles.get(id).map(|entry| entry.value().clone())
    }

    /// Removes and returns the handle; `None` when nothing was registered
    pub fn remove(&self, id: &Uuid) -> Option<ProcessHandle> {
        self.handles.remove(id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.handles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
