use tokio::sync::watch;

/// Lifecycle of a single `run()` invocation (§4.7 state machine).
///
/// ```text
/// IDLE -> RUNNING on first iteration -> RUNNING after each tool round
/// RUNNING -> COMPLETED when iteration finishes with zero tool requests
/// RUNNING -> STOPPED on external stop signal (stops after current tool round)
/// RUNNING -> FAILED on provider error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Stopped,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Stopped | RunStatus::Failed)
    }
}

/// Shared handle used to observe and request cancellation of a run (§4.7
/// *Cancellation*, §5). `stop()` flips a flag the loop checks between tool
/// rounds; it does not abort an in-flight provider call or already-dispatched
/// tools.
#[derive(Clone)]
pub struct RunControl {
    tx: watch::Sender<RunStatus>,
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunStatus::Idle);
        Self { tx }
    }

    pub fn status(&self) -> RunStatus {
        *self.tx.borrow()
    }

    pub fn set(&self, status: RunStatus) {
        let _ = self.tx.send(status);
    }

    /// Request cancellation. A no-op once the run has already reached a
    /// terminal status.
    pub fn stop(&self) {
        if !self.status().is_terminal() {
            self.set(RunStatus::Stopped);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == RunStatus::Stopped
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}
