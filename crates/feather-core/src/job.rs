//! The job pipeline: resolve, collect, assemble, persist, launch.
//!
//! [`prepare`] runs every synchronous stage and leaves the handoff
//! directory ready for the worker. [`launch`] starts the worker and moves
//! the job's [`JobContext`] into the completion callback, so nothing about
//! the job outlives the run.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifacts::{self, ArtifactLayout, JobArtifacts};
use crate::collector::{self, PointPicker, Surface};
use crate::descriptor::{self, JobDescriptor, JobParameters, Scenario, ScenarioParameters};
use crate::error::JobError;
use crate::launcher::{Completion, LaunchRequest, Launcher, LogMode, WorkerHandle};
use crate::resolver;
use crate::units::UnitSystem;

pub const LOAD_PROMPT: &str = "Select points to apply load";
pub const RESTRAINT_PROMPT: &str = "Select points to restrain";

/// Raw selectors and options for one scenario, as the user gave them.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioRequest {
    Lighten {
        material: u32,
        use_case: u32,
        precision: u32,
    },
    Printable {
        material: u32,
        precision: u32,
    },
    Hollow {
        precision: u32,
        wall_thickness: f64,
        infill: bool,
    },
}

impl ScenarioRequest {
    pub fn scenario(&self) -> Scenario {
        match self {
            Self::Lighten { .. } => Scenario::Lighten,
            Self::Printable { .. } => Scenario::Printable,
            Self::Hollow { .. } => Scenario::Hollow,
        }
    }

    fn precision(&self) -> u32 {
        match self {
            Self::Lighten { precision, .. }
            | Self::Printable { precision, .. }
            | Self::Hollow { precision, .. } => *precision,
        }
    }
}

/// Input to [`prepare`].
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub scenario: ScenarioRequest,
    /// Geometry as saved in the handoff directory.
    pub geometry: PathBuf,
    pub model_unit: UnitSystem,
    pub saved_unit: UnitSystem,
    pub layout: ArtifactLayout,
}

/// A job whose artifacts are on disk and ready for the worker.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub layout: ArtifactLayout,
    pub descriptor: JobDescriptor,
    pub artifacts: JobArtifacts,
}

impl PreparedJob {
    pub fn scenario(&self) -> Scenario {
        self.descriptor.scenario()
    }
}

/// Run the synchronous stages of a job.
///
/// Every validation failure is reported before the first file is written.
pub fn prepare(
    request: &JobRequest,
    surface: &dyn Surface,
    picker: &mut dyn PointPicker,
) -> Result<PreparedJob, JobError> {
    let scenario = request.scenario.scenario();
    let resolution = resolver::resolution(scenario.precision_scale(), request.scenario.precision())?;

    let mut loads = Vec::new();
    let mut restraints = Vec::new();

    let params = match request.scenario {
        ScenarioRequest::Lighten {
            material, use_case, ..
        } => {
            let material = resolver::material(resolver::MaterialFamily::Metal, material)?;
            let use_case = resolver::use_case(use_case)?;
            loads = collector::collect_loads(surface, picker, LOAD_PROMPT, use_case.load_magnitude)?;
            restraints = collector::collect_restraints(surface, picker, RESTRAINT_PROMPT)?;
            ScenarioParameters::Lighten { material, use_case }
        }
        ScenarioRequest::Printable { material, .. } => {
            let material = resolver::material(resolver::MaterialFamily::Resin, material)?;
            info!("first voxel layer is the restraint, gravity is the load");
            ScenarioParameters::Printable { material }
        }
        ScenarioRequest::Hollow {
            wall_thickness,
            infill,
            ..
        } => ScenarioParameters::Hollow {
            wall_thickness,
            infill,
        },
    };

    let params = JobParameters {
        scenario: params,
        resolution,
        geometry: request.geometry.clone(),
        model_unit: request.model_unit,
        saved_unit: request.saved_unit,
    };
    let descriptor = descriptor::assemble(&params, &request.layout)?;
    let artifacts = artifacts::persist(&descriptor, &loads, &restraints, &request.layout)?;

    Ok(PreparedJob {
        layout: request.layout.clone(),
        descriptor,
        artifacts,
    })
}

/// Per-job state carried from launch into the completion callback.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub id: Uuid,
    pub scenario: Scenario,
    pub layout: ArtifactLayout,
    pub descriptor: PathBuf,
    /// File the worker is expected to leave behind, if the scenario has one.
    pub result: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl JobContext {
    pub fn new(prepared: &PreparedJob) -> Self {
        let result = match &prepared.descriptor {
            JobDescriptor::Lighten(_) => None,
            JobDescriptor::Printable(d) => Some(d.path_result_info.clone()),
            JobDescriptor::Hollow(d) => Some(d.path_result.clone()),
        };
        Self {
            id: Uuid::new_v4(),
            scenario: prepared.scenario(),
            layout: prepared.layout.clone(),
            descriptor: prepared.artifacts.descriptor.clone(),
            result,
            created_at: Utc::now(),
        }
    }
}

/// How to run the worker.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: PathBuf,
    /// Tee the worker's output into the handoff directory's log file.
    pub with_log: bool,
    pub timeout: Option<Duration>,
}

/// Start the worker for a prepared job.
///
/// `on_complete` receives the job's context once the worker exits. If the
/// worker cannot be started it is never called.
pub async fn launch<F>(
    prepared: &PreparedJob,
    launcher: &dyn Launcher,
    options: &LaunchOptions,
    on_complete: F,
) -> Result<WorkerHandle, JobError>
where
    F: FnOnce(&JobContext, &Completion) + Send + 'static,
{
    let ctx = JobContext::new(prepared);
    let log = if options.with_log {
        LogMode::Tee(ctx.layout.worker_log_path())
    } else {
        LogMode::Inherit
    };
    let request = LaunchRequest {
        job_id: ctx.id,
        executable: options.executable.clone(),
        scenario: ctx.scenario,
        descriptor: ctx.descriptor.clone(),
        log,
        timeout: options.timeout,
    };

    info!(
        job_id = %ctx.id,
        scenario = %ctx.scenario,
        launcher = launcher.name(),
        "process started, please wait"
    );
    launcher
        .launch(request, Box::new(move |completion| on_complete(&ctx, completion)))
        .await
}

/// Default post-processing: log how the run ended and what it left behind.
pub fn report_completion(ctx: &JobContext, completion: &Completion) {
    let elapsed = completion.finished_at - ctx.created_at;
    info!(
        job_id = %ctx.id,
        scenario = %ctx.scenario,
        exit_code = ?completion.exit_code,
        cancelled = completion.cancelled,
        timed_out = completion.timed_out,
        elapsed_ms = elapsed.num_milliseconds(),
        "process finished"
    );
    if let Some(ref result) = ctx.result {
        if result.exists() {
            info!(path = %result.display(), "result file present");
        } else {
            warn!(path = %result.display(), "result file missing");
        }
    }
}
