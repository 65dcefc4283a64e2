//! `feather lighten|printable|hollow`: prepare a job and run the worker on it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;

use feather_core::artifacts::ArtifactLayout;
use feather_core::collector::ReplayPicker;
use feather_core::job::{self, JobRequest, LaunchOptions, ScenarioRequest};
use feather_core::launcher::{Completion, ProcessLauncher};
use feather_core::mesh::TriangleMesh;
use feather_core::units::UnitSystem;

use crate::config::FeatherConfig;

/// Options shared by every scenario command.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// STL file to analyse
    #[arg(long)]
    pub geometry: PathBuf,
    /// Length unit the model was drawn in
    #[arg(long, default_value = "millimeters")]
    pub model_unit: UnitSystem,
    /// Length unit the STL file was saved in (must be millimeters)
    #[arg(long, default_value = "millimeters")]
    pub saved_unit: UnitSystem,
    /// Write the worker's output to worker-log.txt in the handoff directory
    #[arg(long)]
    pub with_log: bool,
    /// Stop the worker after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Pick files for the lighten scenario: loads first, then restraints.
#[derive(Debug, Clone)]
pub struct PickFiles {
    pub loads: PathBuf,
    pub restraints: PathBuf,
}

/// Run one scenario to completion.
pub async fn run_scenario(
    scenario: ScenarioRequest,
    picks: Option<PickFiles>,
    args: &RunArgs,
    config: &FeatherConfig,
) -> Result<Completion> {
    if !args.geometry.is_file() {
        bail!("geometry file not found: {}", args.geometry.display());
    }

    let layout = ArtifactLayout::new(&config.handoff_dir)?;

    let (surface, mut picker) = match picks {
        Some(picks) => {
            let mesh = TriangleMesh::load_stl(&args.geometry)
                .with_context(|| format!("failed to load {}", args.geometry.display()))?;
            let picker = ReplayPicker::from_json_files(&[picks.loads.as_path(), picks.restraints.as_path()])
                .context("failed to read pick files")?;
            (mesh, picker)
        }
        None => (TriangleMesh::default(), ReplayPicker::default()),
    };

    let request = JobRequest {
        scenario,
        geometry: layout.geometry_path(),
        model_unit: args.model_unit,
        saved_unit: args.saved_unit,
        layout: layout.clone(),
    };
    let prepared =
        job::prepare(&request, &surface, &mut picker).context("failed to prepare job")?;

    copy_geometry(&args.geometry, &layout.geometry_path())?;

    let options = LaunchOptions {
        executable: config.worker.clone(),
        with_log: args.with_log || config.with_log,
        timeout: args.timeout.map(Duration::from_secs).or(config.timeout),
    };

    println!("Job files written to {}", layout.dir().display());
    let handle = job::launch(
        &prepared,
        &ProcessLauncher::new(),
        &options,
        job::report_completion,
    )
    .await
    .context("failed to launch worker")?;
    println!("Process started. Please wait...");

    // Set up graceful shutdown: first signal cancels, second force-exits.
    let cancel = handle.cancellation_token();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let signals = tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nStopping the worker (Ctrl+C again to force)...");
            cancel.cancel();
        }
    });

    let completion = handle.wait().await;
    signals.abort();
    let completion = completion?;

    print_completion(&completion, options.with_log.then(|| layout.worker_log_path()));
    Ok(completion)
}

/// Save the geometry under its fixed name unless it is already there.
fn copy_geometry(source: &Path, target: &Path) -> Result<()> {
    let same = match (std::fs::canonicalize(source), std::fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same {
        std::fs::copy(source, target).with_context(|| {
            format!("failed to copy {} to {}", source.display(), target.display())
        })?;
    }
    Ok(())
}

fn print_completion(completion: &Completion, log: Option<PathBuf>) {
    if completion.cancelled {
        println!("\nProcess cancelled.");
    } else if completion.timed_out {
        println!("\nProcess stopped: time limit reached.");
    } else {
        match completion.exit_code {
            Some(0) => println!("\nProcess finished."),
            Some(code) => println!("\nProcess finished with exit code {code}."),
            None => println!("\nProcess ended by a signal."),
        }
    }
    if let Some(log) = log {
        println!("Worker log: {}", log.display());
    }
}

/// Process exit code for a finished job.
pub fn exit_code(completion: &Completion) -> i32 {
    if completion.is_success() {
        0
    } else if completion.cancelled {
        130
    } else {
        1
    }
}
