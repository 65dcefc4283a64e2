//! Job preparation and worker launch for the feather analysis tools.
//!
//! A job resolves the user's selectors, collects picked points, assembles
//! a typed descriptor, writes it to a handoff directory and starts the
//! external worker on it.

pub mod artifacts;
pub mod collector;
pub mod descriptor;
pub mod error;
pub mod job;
pub mod launcher;
pub mod mesh;
pub mod resolver;
pub mod units;

pub use error::JobError;
