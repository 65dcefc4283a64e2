//! Types shared by every launcher.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::descriptor::Scenario;
use crate::error::JobError;

/// Where the worker's console output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogMode {
    /// The worker shares the parent's stdout/stderr.
    #[default]
    Inherit,
    /// Every output line is appended to the file and emitted as a tracing
    /// event.
    Tee(PathBuf),
}

/// Everything needed to start one worker run.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub job_id: Uuid,
    pub executable: PathBuf,
    pub scenario: Scenario,
    /// Absolute path of the persisted descriptor.
    pub descriptor: PathBuf,
    pub log: LogMode,
    /// Terminate the worker if it runs longer than this.
    pub timeout: Option<Duration>,
}

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub job_id: Uuid,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub cancelled: bool,
    pub timed_out: bool,
    pub finished_at: DateTime<Utc>,
}

impl Completion {
    /// Exit code zero and no intervention from our side.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0) && !self.cancelled && !self.timed_out
    }
}

/// Invoked exactly once when a started worker exits.
pub type CompletionCallback = Box<dyn FnOnce(&Completion) + Send + 'static>;

/// Lifecycle of one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    NotStarted,
    Running,
    Completed,
    StartFailed,
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::StartFailed => "start_failed",
        };
        f.write_str(s)
    }
}

/// Handle to a running worker.
///
/// Dropping the handle does not stop the worker; the completion callback
/// still fires when it exits.
#[derive(Debug)]
pub struct WorkerHandle {
    pub job_id: Uuid,
    /// OS process id, if the platform reported one.
    pub pid: Option<u32>,
    cancel: CancellationToken,
    state: watch::Receiver<LaunchState>,
    done: oneshot::Receiver<Completion>,
}

impl WorkerHandle {
    pub fn new(
        job_id: Uuid,
        pid: Option<u32>,
        cancel: CancellationToken,
        state: watch::Receiver<LaunchState>,
        done: oneshot::Receiver<Completion>,
    ) -> Self {
        Self {
            job_id,
            pid,
            cancel,
            state,
            done,
        }
    }

    pub fn state(&self) -> LaunchState {
        *self.state.borrow()
    }

    /// Ask the worker to stop. Completion is still delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this worker when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the worker to exit.
    pub async fn wait(self) -> Result<Completion, JobError> {
        self.done.await.map_err(|_| {
            JobError::io(
                format!("worker monitor for job {} stopped without a completion", self.job_id),
                std::io::Error::other("completion channel closed"),
            )
        })
    }
}
