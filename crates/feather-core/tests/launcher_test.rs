//! End-to-end tests: prepare a job, launch a fake worker on it and observe
//! the completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use feather_core::artifacts::ArtifactLayout;
use feather_core::collector::ReplayPicker;
use feather_core::job::{self, JobRequest, LaunchOptions, PreparedJob, ScenarioRequest};
use feather_core::launcher::{LaunchState, ProcessLauncher};
use feather_core::mesh::TriangleMesh;
use feather_core::units::UnitSystem;
use feather_core::JobError;
use feather_test_utils::{Scratch, write_fake_worker};

fn prepare_printable(handoff: &Scratch) -> PreparedJob {
    let layout = ArtifactLayout::new(handoff.path()).unwrap();
    let request = JobRequest {
        scenario: ScenarioRequest::Printable {
            material: 3,
            precision: 3,
        },
        geometry: layout.geometry_path(),
        model_unit: UnitSystem::Millimeters,
        saved_unit: UnitSystem::Millimeters,
        layout,
    };
    job::prepare(&request, &TriangleMesh::default(), &mut ReplayPicker::default()).unwrap()
}

fn options(executable: PathBuf, with_log: bool) -> LaunchOptions {
    LaunchOptions {
        executable,
        with_log,
        timeout: None,
    }
}

#[tokio::test]
async fn worker_reads_descriptor_and_leaves_result() {
    let handoff = Scratch::new();
    let bin = Scratch::new();
    let prepared = prepare_printable(&handoff);

    // The worker runs in the handoff directory and reads the descriptor it
    // was given before writing its summary.
    let worker = write_fake_worker(
        bin.path(),
        "cotton",
        "test \"$1\" = printable || exit 64\n\
         grep -q LayerToStartFea \"$2\" || exit 65\n\
         echo 'layer 3 ok'\n\
         echo '{\"MaxStress\": 12.5}' > result-info.json\n",
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let handle = job::launch(
        &prepared,
        &ProcessLauncher::new(),
        &options(worker, true),
        move |ctx, completion| {
            job::report_completion(ctx, completion);
            assert_eq!(ctx.id, completion.job_id);
            seen.fetch_add(1, Ordering::SeqCst);
        },
    )
    .await
    .unwrap();

    let completion = handle.wait().await.unwrap();
    assert!(completion.is_success(), "worker failed: {completion:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(handoff.join("result-info.json").exists());
    let log = std::fs::read_to_string(handoff.join("worker-log.txt")).unwrap();
    assert!(log.contains("layer 3 ok"));
}

#[tokio::test]
async fn missing_worker_never_calls_back() {
    let handoff = Scratch::new();
    let prepared = prepare_printable(&handoff);

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let result = job::launch(
        &prepared,
        &ProcessLauncher::new(),
        &options(PathBuf::from("/nonexistent/bin/cotton"), false),
        move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        },
    )
    .await;

    assert!(matches!(result, Err(JobError::IoFailure { .. })));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // Artifacts written before the launch attempt stay on disk.
    assert!(handoff.join("specs.json").exists());
}

#[tokio::test]
async fn failing_worker_still_completes_once() {
    let handoff = Scratch::new();
    let bin = Scratch::new();
    let prepared = prepare_printable(&handoff);
    let worker = write_fake_worker(bin.path(), "cotton", "echo 'license error' >&2\nexit 2\n");

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let handle = job::launch(
        &prepared,
        &ProcessLauncher::new(),
        &options(worker, false),
        move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        },
    )
    .await
    .unwrap();

    let completion = handle.wait().await.unwrap();
    assert_eq!(completion.exit_code, Some(2));
    assert!(!completion.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_job_completes_with_cancelled_flag() {
    let handoff = Scratch::new();
    let bin = Scratch::new();
    let prepared = prepare_printable(&handoff);
    let worker = write_fake_worker(bin.path(), "cotton", "exec sleep 30\n");

    let handle = job::launch(
        &prepared,
        &ProcessLauncher::new().with_grace_period(Duration::from_secs(2)),
        &options(worker, true),
        |_, _| {},
    )
    .await
    .unwrap();
    assert_eq!(handle.state(), LaunchState::Running);

    let token = handle.cancellation_token();
    token.cancel();

    let completion = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("worker was not stopped")
        .unwrap();
    assert!(completion.cancelled);
    assert!(!completion.is_success());
}
