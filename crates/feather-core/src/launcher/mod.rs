//! Worker launch and exit notification.
//!
//! ```text
//! job::launch
//!     |
//!     v
//! dyn Launcher --launch(request, on_complete)--> WorkerHandle
//!     |                                            |
//!     |  monitor task owns the child               |  state()
//!     |     exit / cancel / timeout                |  cancel()
//!     |        |                                   |  wait() -> Completion
//!     |        v                                   |
//!     |   on_complete(&Completion) ---- oneshot ---+
//! ```

pub mod process;
pub mod trait_def;
pub mod types;

pub use process::{DEFAULT_GRACE_PERIOD, DEFAULT_WORKER, ProcessLauncher};
pub use trait_def::Launcher;
pub use types::{
    Completion, CompletionCallback, LaunchRequest, LaunchState, LogMode, WorkerHandle,
};
