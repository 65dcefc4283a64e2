//! The `Launcher` trait -- the seam between job preparation and the
//! process that consumes the descriptor.

use async_trait::async_trait;

use super::types::{CompletionCallback, LaunchRequest, WorkerHandle};
use crate::error::JobError;

/// Starts a worker for a persisted job.
///
/// # Contract
///
/// - If the worker cannot be started, `launch` returns the error and
///   `on_complete` is dropped without being called.
/// - Otherwise `on_complete` is called exactly once, after the worker
///   exits, from a background task. The same [`super::Completion`] is then
///   delivered through [`WorkerHandle::wait`].
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Human-readable name for this launcher (e.g. "process").
    fn name(&self) -> &str;

    async fn launch(
        &self,
        request: LaunchRequest,
        on_complete: CompletionCallback,
    ) -> Result<WorkerHandle, JobError>;
}

// Compile-time assertion: Launcher must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Launcher) {}
};
