//! Launcher that runs the worker as a child process.
//!
//! Runs `<executable> <mode> <descriptor>` with the handoff directory as
//! the working directory. A monitor task owns the child and reports its
//! exit through the completion callback and the handle's channel.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::trait_def::Launcher;
use super::types::{
    Completion, CompletionCallback, LaunchRequest, LaunchState, LogMode, WorkerHandle,
};
use crate::error::JobError;

/// How long a worker gets to exit after SIGTERM before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Upper bound on draining the log after the worker is gone. A grandchild
/// holding the pipes open must not stall completion.
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default worker executable name, found via `$PATH`.
#[cfg(windows)]
pub const DEFAULT_WORKER: &str = "Cotton.exe";
#[cfg(not(windows))]
pub const DEFAULT_WORKER: &str = "cotton";

/// Spawns the worker with tokio and monitors it in a background task.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    grace_period: Duration,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Override the SIGTERM grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

#[async_trait]
impl Launcher for ProcessLauncher {
    fn name(&self) -> &str {
        "process"
    }

    async fn launch(
        &self,
        request: LaunchRequest,
        on_complete: CompletionCallback,
    ) -> Result<WorkerHandle, JobError> {
        let mut cmd = Command::new(&request.executable);
        cmd.arg(request.scenario.mode()).arg(&request.descriptor);
        if let Some(dir) = request.descriptor.parent() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        if matches!(request.log, LogMode::Tee(_)) {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }

        let mut child = cmd.spawn().map_err(|e| {
            warn!(
                job_id = %request.job_id,
                state = %LaunchState::StartFailed,
                executable = %request.executable.display(),
                "worker did not start"
            );
            JobError::io(
                format!(
                    "failed to start worker '{}' -- is it installed and on PATH?",
                    request.executable.display()
                ),
                e,
            )
        })?;
        let pid = child.id();

        // The log is opened only once the worker is running.
        let log_writer = match &request.log {
            LogMode::Inherit => None,
            LogMode::Tee(path) => match tokio::fs::File::create(path).await {
                Ok(file) => Some(tee_output(&mut child, path.clone(), file)),
                Err(e) => {
                    if let Err(kill_err) = child.kill().await {
                        warn!(pid, error = %kill_err, "failed to kill worker");
                    }
                    return Err(JobError::io(
                        format!("failed to create worker log {}", path.display()),
                        e,
                    ));
                }
            },
        };

        info!(
            job_id = %request.job_id,
            pid,
            mode = request.scenario.mode(),
            descriptor = %request.descriptor.display(),
            "worker started"
        );

        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(LaunchState::Running);
        let (done_tx, done_rx) = oneshot::channel();

        let token = cancel.clone();
        let grace = self.grace_period;
        let job_id = request.job_id;
        let timeout = request.timeout;

        tokio::spawn(async move {
            let outcome = tokio::select! {
                status = child.wait() => Outcome::Exited(status),
                _ = token.cancelled() => Outcome::Cancelled,
                _ = expire(timeout) => Outcome::TimedOut,
            };

            let (status, cancelled, timed_out) = match outcome {
                Outcome::Exited(status) => (status, false, false),
                Outcome::Cancelled => {
                    info!(%job_id, "cancelling worker");
                    (terminate(&mut child, grace).await, true, false)
                }
                Outcome::TimedOut => {
                    warn!(%job_id, ?timeout, "worker timed out");
                    (terminate(&mut child, grace).await, false, true)
                }
            };

            let exit_code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(%job_id, error = %e, "failed to wait for worker");
                    None
                }
            };

            if let Some(writer) = log_writer {
                if tokio::time::timeout(LOG_DRAIN_TIMEOUT, writer).await.is_err() {
                    warn!(%job_id, "worker log still open after exit; not waiting for it");
                }
            }

            let completion = Completion {
                job_id,
                exit_code,
                cancelled,
                timed_out,
                finished_at: Utc::now(),
            };
            debug!(%job_id, ?exit_code, cancelled, timed_out, "worker finished");

            let _ = state_tx.send(LaunchState::Completed);
            on_complete(&completion);
            let _ = done_tx.send(completion);
        });

        Ok(WorkerHandle::new(job_id, pid, cancel, state_rx, done_rx))
    }
}

async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

/// SIGTERM, wait up to `grace`, then kill.
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: pid belongs to a child we spawned and have not reaped.
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                warn!(pid, "SIGTERM failed, proceeding to kill");
            }
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!("worker exited after SIGTERM");
            Ok(status)
        }
        _ => {
            debug!("worker did not exit after SIGTERM, killing");
            child.kill().await?;
            child.wait().await
        }
    }
}

/// Pipe stdout and stderr into the log file and the tracing stream.
fn tee_output(child: &mut Child, path: PathBuf, mut file: tokio::fs::File) -> JoinHandle<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<(&'static str, String)>();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, "stdout", tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, "stderr", tx.clone()));
    }
    drop(tx);

    tokio::spawn(async move {
        while let Some((stream, line)) = rx.recv().await {
            info!(target: "feather::worker", stream, "{line}");
            if let Err(e) = write_line(&mut file, &line).await {
                warn!(path = %path.display(), error = %e, "failed to write worker log");
            }
        }
        if let Err(e) = file.flush().await {
            warn!(path = %path.display(), error = %e, "failed to flush worker log");
        }
    })
}

async fn pump<R>(reader: R, stream: &'static str, tx: mpsc::UnboundedSender<(&'static str, String)>)
where
    R: AsyncRead + Unpin + Send,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send((stream, line)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(stream, error = %e, "error reading worker output");
                break;
            }
        }
    }
}

async fn write_line(file: &mut tokio::fs::File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await
}

/// True if `path` names a file that exists; a bare name is left to `$PATH`.
pub fn executable_exists(path: &Path) -> bool {
    if path.components().count() > 1 {
        path.is_file()
    } else {
        true
    }
}
