//! Sample collection: picked surface points to load and restraint records.
//!
//! Picking itself belongs to the host. The host is represented by two
//! seams: a [`Surface`] that can report the normal nearest to a point, and
//! a [`PointPicker`] that yields the user's picks for a prompt.

use std::collections::VecDeque;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::JobError;

/// Normals shorter than this cannot be unitized.
const NORMAL_EPSILON: f64 = 1.0e-12;

/// A surface that picks land on.
pub trait Surface {
    /// Normal of the surface at the point nearest to `point`.
    ///
    /// The vector is not required to be unit length and may be zero for
    /// degenerate geometry.
    fn normal_at(&self, point: &Point3<f64>) -> Vector3<f64>;
}

/// Source of user-picked points.
///
/// A picker yields one finite, ordered batch per prompt. Pickers are not
/// restartable: once a batch has been handed out it is gone.
pub trait PointPicker {
    fn pick(&mut self, surface: &dyn Surface, prompt: &str) -> Vec<Point3<f64>>;
}

/// A picker that replays points captured elsewhere (a file, a test).
///
/// Holds one batch per expected prompt, handed out in order.
#[derive(Debug, Clone, Default)]
pub struct ReplayPicker {
    batches: VecDeque<Vec<Point3<f64>>>,
}

impl ReplayPicker {
    /// A picker with a single batch.
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self::batches(vec![points])
    }

    pub fn batches(batches: Vec<Vec<Point3<f64>>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Read picks from a JSON array of `[x, y, z]` triples.
    pub fn from_json_file(path: &Path) -> Result<Self, JobError> {
        Self::from_json_files(&[path])
    }

    /// One batch per file, in the order given.
    pub fn from_json_files(paths: &[&Path]) -> Result<Self, JobError> {
        let mut batches = Vec::with_capacity(paths.len());
        for path in paths {
            batches.push(read_points(path)?);
        }
        Ok(Self::batches(batches))
    }
}

fn read_points(path: &Path) -> Result<Vec<Point3<f64>>, JobError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        JobError::io(format!("failed to read picks file {}", path.display()), e)
    })?;
    let coords: Vec<[f64; 3]> = serde_json::from_str(&contents)?;
    Ok(coords.into_iter().map(|[x, y, z]| Point3::new(x, y, z)).collect())
}

impl PointPicker for ReplayPicker {
    fn pick(&mut self, _surface: &dyn Surface, prompt: &str) -> Vec<Point3<f64>> {
        let points = self.batches.pop_front().unwrap_or_default();
        info!(prompt, count = points.len(), "replaying picked points");
        points
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A point load: where it acts and the force vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LoadRecord", from = "LoadRecord")]
pub struct LoadPoint {
    pub location: Point3<f64>,
    pub magnitude: Vector3<f64>,
}

/// A restrained point. All three axes are fixed for now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RestraintRecord", from = "RestraintRecord")]
pub struct RestraintPoint {
    pub location: Point3<f64>,
    pub fixed_x: bool,
    pub fixed_y: bool,
    pub fixed_z: bool,
}

impl RestraintPoint {
    pub fn fully_fixed(location: Point3<f64>) -> Self {
        Self {
            location,
            fixed_x: true,
            fixed_y: true,
            fixed_z: true,
        }
    }
}

/// Wire shape of a load in `load-points.json`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoadRecord {
    loc_x: f64,
    loc_y: f64,
    loc_z: f64,
    mag_x: f64,
    mag_y: f64,
    mag_z: f64,
}

/// Wire shape of a restraint in `restraint-points.json`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RestraintRecord {
    loc_x: f64,
    loc_y: f64,
    loc_z: f64,
    is_fixed_x: bool,
    is_fixed_y: bool,
    is_fixed_z: bool,
}

impl From<LoadPoint> for LoadRecord {
    fn from(p: LoadPoint) -> Self {
        Self {
            loc_x: p.location.x,
            loc_y: p.location.y,
            loc_z: p.location.z,
            mag_x: p.magnitude.x,
            mag_y: p.magnitude.y,
            mag_z: p.magnitude.z,
        }
    }
}

impl From<LoadRecord> for LoadPoint {
    fn from(r: LoadRecord) -> Self {
        Self {
            location: Point3::new(r.loc_x, r.loc_y, r.loc_z),
            magnitude: Vector3::new(r.mag_x, r.mag_y, r.mag_z),
        }
    }
}

impl From<RestraintPoint> for RestraintRecord {
    fn from(p: RestraintPoint) -> Self {
        Self {
            loc_x: p.location.x,
            loc_y: p.location.y,
            loc_z: p.location.z,
            is_fixed_x: p.fixed_x,
            is_fixed_y: p.fixed_y,
            is_fixed_z: p.fixed_z,
        }
    }
}

impl From<RestraintRecord> for RestraintPoint {
    fn from(r: RestraintRecord) -> Self {
        Self {
            location: Point3::new(r.loc_x, r.loc_y, r.loc_z),
            fixed_x: r.is_fixed_x,
            fixed_y: r.is_fixed_y,
            fixed_z: r.is_fixed_z,
        }
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Collect load records for the user's picks.
///
/// Each pick becomes one load whose force is the unit surface normal scaled
/// by `magnitude`. A normal that cannot be unitized is logged and used as
/// is, so the record count always equals the pick count.
pub fn collect_loads(
    surface: &dyn Surface,
    picker: &mut dyn PointPicker,
    prompt: &str,
    magnitude: f64,
) -> Result<Vec<LoadPoint>, JobError> {
    let points = picker.pick(surface, prompt);
    if points.is_empty() {
        return Err(JobError::EmptySelection {
            what: "load".to_string(),
        });
    }

    let loads: Vec<LoadPoint> = points
        .into_iter()
        .enumerate()
        .map(|(index, location)| {
            let raw = surface.normal_at(&location);
            let direction = match raw.try_normalize(NORMAL_EPSILON) {
                Some(unit) => unit,
                None => {
                    warn!(index, normal = ?raw, "cannot normalize the load direction");
                    raw
                }
            };
            LoadPoint {
                location,
                magnitude: direction * magnitude,
            }
        })
        .collect();

    info!(count = loads.len(), "load points collected");
    Ok(loads)
}

/// Collect restraint records for the user's picks, all axes fixed.
pub fn collect_restraints(
    surface: &dyn Surface,
    picker: &mut dyn PointPicker,
    prompt: &str,
) -> Result<Vec<RestraintPoint>, JobError> {
    let points = picker.pick(surface, prompt);
    if points.is_empty() {
        return Err(JobError::EmptySelection {
            what: "restraint".to_string(),
        });
    }

    let restraints: Vec<RestraintPoint> =
        points.into_iter().map(RestraintPoint::fully_fixed).collect();

    info!(count = restraints.len(), "restraint points collected");
    Ok(restraints)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
