//! Length unit systems and conversion between them.
//!
//! Names follow the CAD host's spelling (`Millimeters`, `Inches`, ...) so
//! that values written into a descriptor read the same as in the host.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Standard gravitational acceleration in meters per second squared.
pub const GRAVITY_METERS: f64 = 9.810;

/// Length unit systems known to the CAD host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitSystem {
    /// No unit assigned to the document.
    #[serde(rename = "None")]
    Unset,
    Angstroms,
    Nanometers,
    Microns,
    Millimeters,
    Centimeters,
    Decimeters,
    Meters,
    Dekameters,
    Hectometers,
    Kilometers,
    Microinches,
    Mils,
    Inches,
    Feet,
    Yards,
    Miles,
    /// A user-defined unit with no fixed scale.
    CustomUnits,
}

impl UnitSystem {
    /// Every unit that [`convert`] accepts.
    pub const SUPPORTED: [UnitSystem; 16] = [
        Self::Angstroms,
        Self::Nanometers,
        Self::Microns,
        Self::Millimeters,
        Self::Centimeters,
        Self::Decimeters,
        Self::Meters,
        Self::Dekameters,
        Self::Hectometers,
        Self::Kilometers,
        Self::Microinches,
        Self::Mils,
        Self::Inches,
        Self::Feet,
        Self::Yards,
        Self::Miles,
    ];

    /// Length of one unit in meters, or `None` for units without a scale.
    pub fn meters_per_unit(self) -> Option<f64> {
        let scale = match self {
            Self::Unset | Self::CustomUnits => return None,
            Self::Angstroms => 1.0e-10,
            Self::Nanometers => 1.0e-9,
            Self::Microns => 1.0e-6,
            Self::Millimeters => 1.0e-3,
            Self::Centimeters => 1.0e-2,
            Self::Decimeters => 1.0e-1,
            Self::Meters => 1.0,
            Self::Dekameters => 1.0e1,
            Self::Hectometers => 1.0e2,
            Self::Kilometers => 1.0e3,
            Self::Microinches => 2.54e-8,
            Self::Mils => 2.54e-5,
            Self::Inches => 0.0254,
            Self::Feet => 0.3048,
            Self::Yards => 0.9144,
            Self::Miles => 1609.344,
        };
        Some(scale)
    }

    fn scale(self) -> Result<f64, JobError> {
        self.meters_per_unit().ok_or_else(|| JobError::UnsupportedUnit {
            unit: self.to_string(),
        })
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unset => "None",
            Self::Angstroms => "Angstroms",
            Self::Nanometers => "Nanometers",
            Self::Microns => "Microns",
            Self::Millimeters => "Millimeters",
            Self::Centimeters => "Centimeters",
            Self::Decimeters => "Decimeters",
            Self::Meters => "Meters",
            Self::Dekameters => "Dekameters",
            Self::Hectometers => "Hectometers",
            Self::Kilometers => "Kilometers",
            Self::Microinches => "Microinches",
            Self::Mils => "Mils",
            Self::Inches => "Inches",
            Self::Feet => "Feet",
            Self::Yards => "Yards",
            Self::Miles => "Miles",
            Self::CustomUnits => "CustomUnits",
        };
        f.write_str(s)
    }
}

impl FromStr for UnitSystem {
    type Err = JobError;

    /// Parse a unit name case-insensitively. Short aliases (`mm`, `in`, ...)
    /// are accepted alongside the host spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::Unset),
            "angstroms" | "angstrom" => Ok(Self::Angstroms),
            "nanometers" | "nm" => Ok(Self::Nanometers),
            "microns" | "micron" | "um" => Ok(Self::Microns),
            "millimeters" | "millimeter" | "mm" => Ok(Self::Millimeters),
            "centimeters" | "centimeter" | "cm" => Ok(Self::Centimeters),
            "decimeters" | "dm" => Ok(Self::Decimeters),
            "meters" | "meter" | "m" => Ok(Self::Meters),
            "dekameters" | "dam" => Ok(Self::Dekameters),
            "hectometers" | "hm" => Ok(Self::Hectometers),
            "kilometers" | "km" => Ok(Self::Kilometers),
            "microinches" => Ok(Self::Microinches),
            "mils" | "mil" => Ok(Self::Mils),
            "inches" | "inch" | "in" => Ok(Self::Inches),
            "feet" | "foot" | "ft" => Ok(Self::Feet),
            "yards" | "yard" | "yd" => Ok(Self::Yards),
            "miles" | "mile" | "mi" => Ok(Self::Miles),
            "customunits" | "custom" => Ok(Self::CustomUnits),
            _ => Err(JobError::UnsupportedUnit {
                unit: s.to_owned(),
            }),
        }
    }
}

/// Convert a length-scaled quantity from one unit system to another.
///
/// Identity conversions return `value` unchanged. Fails with
/// [`JobError::UnsupportedUnit`] when either side has no fixed scale.
pub fn convert(value: f64, from: UnitSystem, to: UnitSystem) -> Result<f64, JobError> {
    let from_scale = from.scale()?;
    let to_scale = to.scale()?;
    if from == to {
        return Ok(value);
    }
    Ok(value * (from_scale / to_scale))
}
