//! Error taxonomy for the job pipeline.
//!
//! Every stage of the pipeline reports failures through [`JobError`].
//! Validation errors (selectors, selections, units, parameters) are raised
//! before any artifact is written; only [`JobError::IoFailure`] can occur
//! after the first file has landed in the handoff directory.

use std::path::PathBuf;

use thiserror::Error;

use crate::resolver::Category;

/// Errors that can occur while preparing or launching a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// A selector was outside its category's closed range.
    #[error("{category} selector {selector} is out of range (expected {min}..={max})")]
    OutOfRangeSelector {
        category: Category,
        selector: u32,
        min: u32,
        max: u32,
    },

    /// The user picked no sample points.
    #[error("no {what} points are selected")]
    EmptySelection { what: String },

    /// The geometry was saved in a unit other than millimeters.
    #[error("unit of STL file must be set to millimeters but it is {found}")]
    UnitPreconditionViolation { found: String },

    /// A unit system outside the supported set.
    #[error("unsupported unit system: {unit}")]
    UnsupportedUnit { unit: String },

    /// A file write, file read or process start failed.
    #[error("{context}")]
    IoFailure {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Encoding a descriptor or dataset failed.
    #[error("failed to encode job data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Geometry content could not be interpreted.
    #[error("invalid geometry in {path}: {message}")]
    InvalidGeometry { path: PathBuf, message: String },

    /// A path that must be absolute was relative.
    #[error("path must be absolute: {0}")]
    RelativePath(PathBuf),

    /// A scalar parameter failed validation.
    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },
}

impl JobError {
    /// Build an [`JobError::IoFailure`] with a human-readable context line.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoFailure {
            context: context.into(),
            source,
        }
    }

    /// Whether the error is an exception-level failure rather than an
    /// ordinary validation failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnitPreconditionViolation { .. })
    }
}
