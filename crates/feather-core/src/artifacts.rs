//! Handoff directory layout and artifact persistence.
//!
//! The worker is given a single path, the descriptor. Every other file it
//! needs is named inside the descriptor, and all of them live side by side
//! in one handoff directory under fixed names. Fixed names mean a second
//! job in the same directory overwrites the first one's files.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::collector::{LoadPoint, RestraintPoint};
use crate::descriptor::JobDescriptor;
use crate::error::JobError;

/// Placeholder the worker replaces with a layer number.
pub const LAYER_PLACEHOLDER: char = '#';

const DESCRIPTOR_FILE: &str = "specs.json";
const LOADS_FILE: &str = "load-points.json";
const RESTRAINTS_FILE: &str = "restraint-points.json";
const GEOMETRY_FILE: &str = "input.stl";
const LAYERED_RESULT_FILE: &str = "result-layer0-to-layer#.inp";
const RESULT_INFO_FILE: &str = "result-info.json";
const FEA_LOG_FILE: &str = "FEA-log.txt";
const HOLLOW_RESULT_FILE: &str = "hollowed.stl";
const WORKER_LOG_FILE: &str = "worker-log.txt";

/// Stable file names inside one handoff directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    dir: PathBuf,
}

impl ArtifactLayout {
    /// Create a layout rooted at `dir`, made absolute against the current
    /// directory if necessary.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, JobError> {
        let dir = std::path::absolute(dir.as_ref()).map_err(|e| {
            JobError::io(
                format!("failed to resolve handoff directory {}", dir.as_ref().display()),
                e,
            )
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.dir.join(DESCRIPTOR_FILE)
    }

    pub fn loads_path(&self) -> PathBuf {
        self.dir.join(LOADS_FILE)
    }

    pub fn restraints_path(&self) -> PathBuf {
        self.dir.join(RESTRAINTS_FILE)
    }

    /// Where the host saves the input geometry for the worker.
    pub fn geometry_path(&self) -> PathBuf {
        self.dir.join(GEOMETRY_FILE)
    }

    /// Layered result template; contains [`LAYER_PLACEHOLDER`].
    pub fn layered_result_template(&self) -> PathBuf {
        self.dir.join(LAYERED_RESULT_FILE)
    }

    pub fn result_info_path(&self) -> PathBuf {
        self.dir.join(RESULT_INFO_FILE)
    }

    pub fn fea_log_path(&self) -> PathBuf {
        self.dir.join(FEA_LOG_FILE)
    }

    pub fn hollow_result_path(&self) -> PathBuf {
        self.dir.join(HOLLOW_RESULT_FILE)
    }

    /// Destination of the worker's console output in "with log" runs.
    pub fn worker_log_path(&self) -> PathBuf {
        self.dir.join(WORKER_LOG_FILE)
    }
}

/// Paths written for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobArtifacts {
    pub descriptor: PathBuf,
    pub loads: Option<PathBuf>,
    pub restraints: Option<PathBuf>,
}

impl JobArtifacts {
    /// Every written path, descriptor last.
    pub fn paths(&self) -> Vec<&Path> {
        let mut out: Vec<&Path> = Vec::with_capacity(3);
        if let Some(ref p) = self.loads {
            out.push(p);
        }
        if let Some(ref p) = self.restraints {
            out.push(p);
        }
        out.push(&self.descriptor);
        out
    }
}

/// Write the descriptor and the datasets it references.
///
/// Datasets are written only when the descriptor names a path for them,
/// always before the descriptor itself. Existing files are overwritten.
pub fn persist(
    descriptor: &JobDescriptor,
    loads: &[LoadPoint],
    restraints: &[RestraintPoint],
    layout: &ArtifactLayout,
) -> Result<JobArtifacts, JobError> {
    std::fs::create_dir_all(layout.dir()).map_err(|e| {
        JobError::io(
            format!("failed to create handoff directory {}", layout.dir().display()),
            e,
        )
    })?;

    let loads_path = match descriptor.loads_path() {
        Some(path) => {
            write_json(path, loads)?;
            Some(path.to_path_buf())
        }
        None => None,
    };
    let restraints_path = match descriptor.restraints_path() {
        Some(path) => {
            write_json(path, restraints)?;
            Some(path.to_path_buf())
        }
        None => None,
    };

    let descriptor_path = layout.descriptor_path();
    let json = descriptor.to_json()?;
    write_text(&descriptor_path, &json)?;

    info!(
        dir = %layout.dir().display(),
        scenario = %descriptor.scenario(),
        loads = loads_path.is_some(),
        restraints = restraints_path.is_some(),
        "job artifacts written"
    );

    Ok(JobArtifacts {
        descriptor: descriptor_path,
        loads: loads_path,
        restraints: restraints_path,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), JobError> {
    let json = serde_json::to_string(value)?;
    write_text(path, &json)
}

fn write_text(path: &Path, contents: &str) -> Result<(), JobError> {
    std::fs::write(path, contents)
        .map_err(|e| JobError::io(format!("failed to write {}", path.display()), e))?;
    debug!(path = %path.display(), bytes = contents.len(), "artifact written");
    Ok(())
}
