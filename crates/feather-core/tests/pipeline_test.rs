//! Integration tests for job preparation: resolve -> collect -> assemble ->
//! persist, against a real STL surface and a scratch handoff directory.

use std::path::Path;

use nalgebra::Point3;

use feather_core::artifacts::ArtifactLayout;
use feather_core::collector::{LoadPoint, ReplayPicker, RestraintPoint};
use feather_core::descriptor::{JobDescriptor, Scenario};
use feather_core::job::{self, JobRequest, ScenarioRequest};
use feather_core::mesh::TriangleMesh;
use feather_core::resolver::{Category, PrecisionScale};
use feather_core::units::UnitSystem;
use feather_core::JobError;
use feather_test_utils::{Scratch, write_box_stl, write_picks};

// ===========================================================================
// Helpers
// ===========================================================================

/// A 10 x 10 x 2 plate: picks at z = 2 land on the top face, z = 0 on the
/// bottom.
fn plate(dir: &Path) -> TriangleMesh {
    let path = dir.join("plate.stl");
    write_box_stl(&path, [10.0, 10.0, 2.0]);
    TriangleMesh::load_stl(&path).unwrap()
}

fn request(layout: ArtifactLayout, scenario: ScenarioRequest) -> JobRequest {
    JobRequest {
        scenario,
        geometry: layout.geometry_path(),
        model_unit: UnitSystem::Millimeters,
        saved_unit: UnitSystem::Millimeters,
        layout,
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ===========================================================================
// Lighten
// ===========================================================================

#[test]
fn lighten_writes_descriptor_and_both_datasets() {
    let geometry = Scratch::new();
    let handoff = Scratch::new();
    let mesh = plate(geometry.path());

    let layout = ArtifactLayout::new(handoff.path()).unwrap();
    let req = request(
        layout,
        ScenarioRequest::Lighten {
            material: 3,
            use_case: 4,
            precision: 3,
        },
    );

    // Loads and restraints are picked in that order, one batch each.
    let mut picker = ReplayPicker::batches(vec![
        vec![Point3::new(2.0, 2.0, 2.0), Point3::new(8.0, 8.0, 2.0)],
        vec![
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
            Point3::new(9.0, 9.0, 0.0),
        ],
    ]);

    let prepared = job::prepare(&req, &mesh, &mut picker).unwrap();

    assert_eq!(
        handoff.file_names(),
        vec!["load-points.json", "restraint-points.json", "specs.json"]
    );

    let JobDescriptor::Lighten(d) = &prepared.descriptor else {
        panic!("expected lighten descriptor");
    };
    assert_eq!(d.resolution.0, 90);

    let loads: Vec<LoadPoint> =
        serde_json::from_value(read_json(&handoff.join("load-points.json"))).unwrap();
    assert_eq!(loads.len(), 2);
    for load in &loads {
        assert!((load.magnitude.z - 200.0).abs() < 1e-9, "got {:?}", load.magnitude);
        assert!(load.magnitude.x.abs() < 1e-9 && load.magnitude.y.abs() < 1e-9);
    }

    let restraints: Vec<RestraintPoint> =
        serde_json::from_value(read_json(&handoff.join("restraint-points.json"))).unwrap();
    assert_eq!(restraints.len(), 3);
    assert!(restraints.iter().all(|r| r.fixed_x && r.fixed_y && r.fixed_z));

    let specs = read_json(&handoff.join("specs.json"));
    assert_eq!(specs["PathLoadPoints"], handoff.join("load-points.json").to_str().unwrap());
    assert_eq!(specs["GravityIsNeeded"], false);
}

#[test]
fn pick_files_feed_collection() {
    let geometry = Scratch::new();
    let handoff = Scratch::new();
    let mesh = plate(geometry.path());

    // Side faces: a pick on x = 10 pushes along +X.
    let loads_file = geometry.join("loads.json");
    write_picks(&loads_file, &[[10.0, 5.0, 1.0]]);
    let mut picker = ReplayPicker::from_json_file(&loads_file).unwrap();

    let loads = feather_core::collector::collect_loads(&mesh, &mut picker, "load", 800.0).unwrap();
    assert_eq!(loads.len(), 1);
    assert!((loads[0].magnitude.x - 800.0).abs() < 1e-9);

    // Restraints come from a second file, replayed separately.
    let restraints_file = geometry.join("restraints.json");
    write_picks(&restraints_file, &[[0.0, 5.0, 1.0], [5.0, 0.0, 1.0]]);
    let mut picker = ReplayPicker::from_json_file(&restraints_file).unwrap();
    let restraints =
        feather_core::collector::collect_restraints(&mesh, &mut picker, "restraint").unwrap();
    assert_eq!(restraints.len(), 2);
    assert!(handoff.file_names().is_empty());
}

// ===========================================================================
// Failures before any write
// ===========================================================================

#[test]
fn non_millimeter_saved_unit_is_fatal_and_writes_nothing() {
    let handoff = Scratch::new();
    let target = handoff.join("job");
    let layout = ArtifactLayout::new(&target).unwrap();
    let mut req = request(
        layout,
        ScenarioRequest::Printable {
            material: 3,
            precision: 3,
        },
    );
    req.saved_unit = UnitSystem::Inches;

    let err = job::prepare(&req, &TriangleMesh::default(), &mut ReplayPicker::default()).unwrap_err();
    assert!(matches!(err, JobError::UnitPreconditionViolation { ref found } if found == "Inches"));
    assert!(err.is_fatal());
    assert!(!target.exists());
}

#[test]
fn out_of_range_precision_leaves_no_descriptor() {
    let handoff = Scratch::new();
    let layout = ArtifactLayout::new(handoff.path()).unwrap();
    let req = request(
        layout,
        ScenarioRequest::Printable {
            material: 3,
            precision: 6,
        },
    );

    let err = job::prepare(&req, &TriangleMesh::default(), &mut ReplayPicker::default()).unwrap_err();
    match err {
        JobError::OutOfRangeSelector {
            category,
            selector,
            min,
            max,
        } => {
            assert_eq!(category, Category::Precision(PrecisionScale::FiveLevel));
            assert_eq!((selector, min, max), (6, 1, 5));
        }
        other => panic!("expected OutOfRangeSelector, got {other:?}"),
    }
    assert!(!handoff.join("specs.json").exists());
}

#[test]
fn hollow_thickness_out_of_range_writes_nothing() {
    let handoff = Scratch::new();
    let layout = ArtifactLayout::new(handoff.path()).unwrap();
    let req = request(
        layout,
        ScenarioRequest::Hollow {
            precision: 2,
            wall_thickness: 150.0,
            infill: false,
        },
    );

    let err = job::prepare(&req, &TriangleMesh::default(), &mut ReplayPicker::default()).unwrap_err();
    assert!(matches!(err, JobError::InvalidParameter { .. }));
    assert!(!err.is_fatal());
    assert!(handoff.file_names().is_empty());
}

// ===========================================================================
// Printable and hollow
// ===========================================================================

#[test]
fn printable_descriptor_on_disk() {
    let handoff = Scratch::new();
    let layout = ArtifactLayout::new(handoff.path()).unwrap();
    let req = request(
        layout,
        ScenarioRequest::Printable {
            material: 5,
            precision: 1,
        },
    );

    let prepared = job::prepare(&req, &TriangleMesh::default(), &mut ReplayPicker::default()).unwrap();
    assert_eq!(prepared.scenario(), Scenario::Printable);
    assert_eq!(handoff.file_names(), vec!["specs.json"]);

    let specs = read_json(&handoff.join("specs.json"));
    assert_eq!(specs["GravityDirectionZ"], 1.0);
    assert_eq!(specs["GravityIsNeeded"], true);
    assert_eq!(specs["LayerToStartFea"], 3);
    assert_eq!(specs["TensileStrength"], 38.0);
    assert_eq!(specs["Resolution"], 30);
    let template = specs["PathResultWithPlaceholder"].as_str().unwrap();
    assert!(template.contains('#'));
    assert!(Path::new(template).is_absolute());
}

#[test]
fn rerun_overwrites_previous_descriptor() {
    let handoff = Scratch::new();
    let run = |precision| {
        let layout = ArtifactLayout::new(handoff.path()).unwrap();
        let req = request(
            layout,
            ScenarioRequest::Hollow {
                precision,
                wall_thickness: 1.8,
                infill: false,
            },
        );
        job::prepare(&req, &TriangleMesh::default(), &mut ReplayPicker::default()).unwrap();
        read_json(&handoff.join("specs.json"))["Resolution"].as_u64().unwrap()
    };

    assert_eq!(run(1), 60);
    assert_eq!(run(3), 120);
    assert_eq!(handoff.file_names(), vec!["specs.json"]);
}
