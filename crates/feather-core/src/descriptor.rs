//! Typed job descriptors, one per scenario.
//!
//! A descriptor is the only file the worker is pointed at. It carries the
//! resolved physical constants, gravity, resolution, unit systems and the
//! absolute paths of every other artifact. Keys are PascalCase on the wire
//! because the worker reads them that way.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifacts::{ArtifactLayout, LAYER_PLACEHOLDER};
use crate::error::JobError;
use crate::resolver::{MaterialFamily, MaterialProfile, PrecisionScale, ResolutionSetting, UseCaseProfile};
use crate::units::{self, UnitSystem, GRAVITY_METERS};

/// First voxel layer the printability analysis evaluates.
pub const LAYER_TO_START_FEA: u32 = 3;

/// Wall thickness bounds for hollowing, in model units.
pub const WALL_THICKNESS_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

/// Default hollowing wall thickness, in model units.
pub const DEFAULT_WALL_THICKNESS: f64 = 1.8;

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// The flavour of analysis a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Mass lightening of jewelry under a use-case load.
    Lighten,
    /// Printability of an SLA resin print.
    Printable,
    /// Hollowing with a fixed wall thickness.
    Hollow,
}

impl Scenario {
    /// Keyword passed to the worker as its first argument.
    pub fn mode(self) -> &'static str {
        match self {
            Self::Lighten => "lighten",
            Self::Printable => "printable",
            Self::Hollow => "hollow",
        }
    }

    /// Which precision enumeration the scenario exposes.
    pub fn precision_scale(self) -> PrecisionScale {
        match self {
            Self::Lighten | Self::Printable => PrecisionScale::FiveLevel,
            Self::Hollow => PrecisionScale::ThreeLevel,
        }
    }

    /// Material family, if the scenario takes a material at all.
    pub fn material_family(self) -> Option<MaterialFamily> {
        match self {
            Self::Lighten => Some(MaterialFamily::Metal),
            Self::Printable => Some(MaterialFamily::Resin),
            Self::Hollow => None,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode())
    }
}

impl FromStr for Scenario {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lighten" => Ok(Self::Lighten),
            "printable" => Ok(Self::Printable),
            "hollow" => Ok(Self::Hollow),
            other => Err(JobError::InvalidParameter {
                name: "scenario",
                message: format!("unknown scenario {other:?}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Gravity
// ---------------------------------------------------------------------------

/// Gravity direction and whether the worker should apply it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityPolicy {
    pub direction: Vector3<f64>,
    pub needed: bool,
}

impl GravityPolicy {
    /// Gravity for a scenario, or `None` when the scenario has none.
    ///
    /// Printable models are printed upside-down on an SLA platform, so
    /// gravity points along +Z for them and must be applied.
    pub fn for_scenario(scenario: Scenario) -> Option<Self> {
        match scenario {
            Scenario::Lighten => Some(Self {
                direction: Vector3::new(0.0, 0.0, -1.0),
                needed: false,
            }),
            Scenario::Printable => Some(Self {
                direction: Vector3::new(0.0, 0.0, 1.0),
                needed: true,
            }),
            Scenario::Hollow => None,
        }
    }

    fn to_fields(self, magnitude: f64) -> GravityFields {
        GravityFields {
            gravity_direction_x: self.direction.x,
            gravity_direction_y: self.direction.y,
            gravity_direction_z: self.direction.z,
            gravity_magnitude: magnitude,
            gravity_is_needed: self.needed,
        }
    }
}

/// Gravity as it appears in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GravityFields {
    pub gravity_direction_x: f64,
    pub gravity_direction_y: f64,
    pub gravity_direction_z: f64,
    /// Acceleration in the saved geometry's length unit per s^2.
    pub gravity_magnitude: f64,
    pub gravity_is_needed: bool,
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LightenDescriptor {
    pub path_stl: PathBuf,
    pub path_load_points: PathBuf,
    pub path_restraint_points: PathBuf,
    #[serde(flatten)]
    pub material: MaterialProfile,
    #[serde(flatten)]
    pub gravity: GravityFields,
    pub resolution: ResolutionSetting,
    pub nonlinear_considered: bool,
    pub exact_surface_considered: bool,
    pub model_unit_system: UnitSystem,
    pub model_unit_system_of_saved_stl_file: UnitSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrintableDescriptor {
    pub path_stl: PathBuf,
    /// Layered result template; the worker substitutes the layer number
    /// for the placeholder.
    pub path_result_with_placeholder: PathBuf,
    pub path_result_info: PathBuf,
    pub path_log_fea: PathBuf,
    pub layer_to_start_fea: u32,
    #[serde(flatten)]
    pub material: MaterialProfile,
    #[serde(flatten)]
    pub gravity: GravityFields,
    pub resolution: ResolutionSetting,
    pub nonlinear_considered: bool,
    pub exact_surface_considered: bool,
    pub model_unit_system: UnitSystem,
    pub model_unit_system_of_saved_stl_file: UnitSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HollowDescriptor {
    pub path_stl: PathBuf,
    pub path_result: PathBuf,
    /// Model units.
    pub wall_thickness: f64,
    pub resolution: ResolutionSetting,
    pub infill_is_needed: bool,
    pub model_unit_system: UnitSystem,
    pub model_unit_system_of_saved_stl_file: UnitSystem,
}

/// A descriptor of any scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum JobDescriptor {
    Lighten(LightenDescriptor),
    Printable(PrintableDescriptor),
    Hollow(HollowDescriptor),
}

impl JobDescriptor {
    pub fn scenario(&self) -> Scenario {
        match self {
            Self::Lighten(_) => Scenario::Lighten,
            Self::Printable(_) => Scenario::Printable,
            Self::Hollow(_) => Scenario::Hollow,
        }
    }

    pub fn path_stl(&self) -> &Path {
        match self {
            Self::Lighten(d) => &d.path_stl,
            Self::Printable(d) => &d.path_stl,
            Self::Hollow(d) => &d.path_stl,
        }
    }

    /// Where the load dataset goes, if the scenario has one.
    pub fn loads_path(&self) -> Option<&Path> {
        match self {
            Self::Lighten(d) => Some(&d.path_load_points),
            _ => None,
        }
    }

    /// Where the restraint dataset goes, if the scenario has one.
    pub fn restraints_path(&self) -> Option<&Path> {
        match self {
            Self::Lighten(d) => Some(&d.path_restraint_points),
            _ => None,
        }
    }

    /// Summary file the worker writes when it finishes, if any.
    pub fn result_info_path(&self) -> Option<&Path> {
        match self {
            Self::Printable(d) => Some(&d.path_result_info),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String, JobError> {
        let json = match self {
            Self::Lighten(d) => serde_json::to_string_pretty(d)?,
            Self::Printable(d) => serde_json::to_string_pretty(d)?,
            Self::Hollow(d) => serde_json::to_string_pretty(d)?,
        };
        Ok(json)
    }

    /// Parse a descriptor; the scenario decides which shape to expect.
    pub fn from_json(scenario: Scenario, json: &str) -> Result<Self, JobError> {
        let descriptor = match scenario {
            Scenario::Lighten => Self::Lighten(serde_json::from_str(json)?),
            Scenario::Printable => Self::Printable(serde_json::from_str(json)?),
            Scenario::Hollow => Self::Hollow(serde_json::from_str(json)?),
        };
        Ok(descriptor)
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Per-scenario resolved inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioParameters {
    Lighten {
        material: MaterialProfile,
        use_case: UseCaseProfile,
    },
    Printable {
        material: MaterialProfile,
    },
    Hollow {
        wall_thickness: f64,
        infill: bool,
    },
}

impl ScenarioParameters {
    pub fn scenario(&self) -> Scenario {
        match self {
            Self::Lighten { .. } => Scenario::Lighten,
            Self::Printable { .. } => Scenario::Printable,
            Self::Hollow { .. } => Scenario::Hollow,
        }
    }
}

/// Everything the assembler needs besides the artifact layout.
#[derive(Debug, Clone, PartialEq)]
pub struct JobParameters {
    pub scenario: ScenarioParameters,
    pub resolution: ResolutionSetting,
    /// Geometry as saved for the worker. Must be absolute.
    pub geometry: PathBuf,
    pub model_unit: UnitSystem,
    pub saved_unit: UnitSystem,
}

/// Build the descriptor for a job.
///
/// All checks run before anything is constructed: the saved unit, the
/// geometry path, the wall thickness, then the layered result template.
pub fn assemble(params: &JobParameters, layout: &ArtifactLayout) -> Result<JobDescriptor, JobError> {
    if params.saved_unit != UnitSystem::Millimeters {
        return Err(JobError::UnitPreconditionViolation {
            found: params.saved_unit.to_string(),
        });
    }
    if !params.geometry.is_absolute() {
        return Err(JobError::RelativePath(params.geometry.clone()));
    }
    if let ScenarioParameters::Hollow { wall_thickness, .. } = params.scenario {
        if !WALL_THICKNESS_RANGE.contains(&wall_thickness) {
            return Err(JobError::InvalidParameter {
                name: "wall thickness",
                message: format!(
                    "{wall_thickness} is outside {}..={}",
                    WALL_THICKNESS_RANGE.start(),
                    WALL_THICKNESS_RANGE.end()
                ),
            });
        }
    }
    let template = layout.layered_result_template();
    if matches!(params.scenario, ScenarioParameters::Printable { .. })
        && !template.to_string_lossy().contains(LAYER_PLACEHOLDER)
    {
        return Err(JobError::InvalidParameter {
            name: "result template",
            message: format!("{} has no {LAYER_PLACEHOLDER} placeholder", template.display()),
        });
    }

    let scenario = params.scenario.scenario();
    let gravity = match GravityPolicy::for_scenario(scenario) {
        Some(policy) => {
            let magnitude = units::convert(GRAVITY_METERS, UnitSystem::Meters, params.saved_unit)?;
            Some(policy.to_fields(magnitude))
        }
        None => None,
    };

    let descriptor = match (&params.scenario, gravity) {
        (ScenarioParameters::Lighten { material, use_case }, Some(gravity)) => {
            debug!(load_magnitude = use_case.load_magnitude, "assembling lighten descriptor");
            JobDescriptor::Lighten(LightenDescriptor {
                path_stl: params.geometry.clone(),
                path_load_points: layout.loads_path(),
                path_restraint_points: layout.restraints_path(),
                material: *material,
                gravity,
                resolution: params.resolution,
                nonlinear_considered: false,
                exact_surface_considered: true,
                model_unit_system: params.model_unit,
                model_unit_system_of_saved_stl_file: params.saved_unit,
            })
        }
        (ScenarioParameters::Printable { material }, Some(gravity)) => {
            JobDescriptor::Printable(PrintableDescriptor {
                path_stl: params.geometry.clone(),
                path_result_with_placeholder: template,
                path_result_info: layout.result_info_path(),
                path_log_fea: layout.fea_log_path(),
                layer_to_start_fea: LAYER_TO_START_FEA,
                material: *material,
                gravity,
                resolution: params.resolution,
                nonlinear_considered: false,
                exact_surface_considered: true,
                model_unit_system: params.model_unit,
                model_unit_system_of_saved_stl_file: params.saved_unit,
            })
        }
        (
            ScenarioParameters::Hollow {
                wall_thickness,
                infill,
            },
            _,
        ) => JobDescriptor::Hollow(HollowDescriptor {
            path_stl: params.geometry.clone(),
            path_result: layout.hollow_result_path(),
            wall_thickness: *wall_thickness,
            resolution: params.resolution,
            infill_is_needed: *infill,
            model_unit_system: params.model_unit,
            model_unit_system_of_saved_stl_file: params.saved_unit,
        }),
        (_, None) => {
            return Err(JobError::InvalidParameter {
                name: "scenario",
                message: format!("{scenario} requires a gravity policy"),
            });
        }
    };

    debug!(scenario = %scenario, resolution = params.resolution.0, "descriptor assembled");
    Ok(descriptor)
}
