//! Selector resolution: small integer codes to physical constants.
//!
//! Users pick materials, use-cases and precision levels by number
//! ("Low=1, Medium=2, High=3"). This module is the only place that
//! translates those numbers into values, so every command sees the same
//! constants when a table is revised.
//!
//! All material constants are authored in millimeter-based units:
//! mass density in N*s^2/mm^4, moduli and strengths in MPa (N/mm^2).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Material families, one per analysis scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialFamily {
    /// Jewelry metals, used by mass lightening.
    Metal,
    /// 3D print resins, used by printability analysis.
    Resin,
}

/// Precision enumerations. Commands expose either five or three levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecisionScale {
    FiveLevel,
    ThreeLevel,
}

/// A selector category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Material(MaterialFamily),
    UseCase,
    Precision(PrecisionScale),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Material(MaterialFamily::Metal) => "metal material",
            Self::Material(MaterialFamily::Resin) => "resin material",
            Self::UseCase => "jewelry type",
            Self::Precision(PrecisionScale::FiveLevel) => "precision",
            Self::Precision(PrecisionScale::ThreeLevel) => "hollowing precision",
        };
        f.write_str(s)
    }
}

/// Physical constants of one material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MaterialProfile {
    /// N*s^2/mm^4.
    pub mass_density: f64,
    /// MPa.
    pub young_modulus: f64,
    pub poisson_ratio: f64,
    /// MPa. Only resins carry a tensile strength.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensile_strength: Option<f64>,
}

/// What a use-case selector resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UseCaseProfile {
    /// Load magnitude scalar in newtons.
    pub load_magnitude: f64,
}

/// Voxel count along the longest axis of the model's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionSetting(pub u32);

/// A resolved selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Profile {
    Material(MaterialProfile),
    UseCase(UseCaseProfile),
    Resolution(ResolutionSetting),
}

/// One row of a lookup table.
struct Entry<T> {
    label: &'static str,
    value: T,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

// Every metal and every resin currently shares the same constants. The rows
// are kept separate so real data can be dropped in per selector.
const STEEL_LIKE: MaterialProfile = MaterialProfile {
    mass_density: 7.85e-9,
    young_modulus: 210_000.0,
    poisson_ratio: 0.3,
    tensile_strength: None,
};

// Formlabs standard resin: density assumed between 1.15 and 1.25 g/cm^3.
const STANDARD_RESIN: MaterialProfile = MaterialProfile {
    mass_density: 1250.0e-12,
    young_modulus: 1.6 * 1000.0,
    poisson_ratio: 0.3,
    tensile_strength: Some(38.0),
};

static METALS: [Entry<MaterialProfile>; 5] = [
    Entry { label: "Gold", value: STEEL_LIKE },
    Entry { label: "Silver", value: STEEL_LIKE },
    Entry { label: "Platinum", value: STEEL_LIKE },
    Entry { label: "Copper", value: STEEL_LIKE },
    Entry { label: "Other", value: STEEL_LIKE },
];

static RESINS: [Entry<MaterialProfile>; 5] = [
    Entry { label: "Very soft", value: STANDARD_RESIN },
    Entry { label: "Soft", value: STANDARD_RESIN },
    Entry { label: "Medium", value: STANDARD_RESIN },
    Entry { label: "Hard", value: STANDARD_RESIN },
    Entry { label: "Very hard", value: STANDARD_RESIN },
];

// 800 N is roughly the weight of an adult.
static USE_CASES: [Entry<UseCaseProfile>; 8] = [
    Entry { label: "Crown", value: UseCaseProfile { load_magnitude: 800.0 } },
    Entry { label: "Necklace", value: UseCaseProfile { load_magnitude: 200.0 } },
    Entry { label: "Bracelet/Armlet/Anklet", value: UseCaseProfile { load_magnitude: 200.0 } },
    Entry { label: "Ring", value: UseCaseProfile { load_magnitude: 200.0 } },
    Entry { label: "Earring", value: UseCaseProfile { load_magnitude: 200.0 } },
    Entry { label: "Belly/waist", value: UseCaseProfile { load_magnitude: 800.0 } },
    Entry { label: "Piercing", value: UseCaseProfile { load_magnitude: 200.0 } },
    Entry { label: "Other", value: UseCaseProfile { load_magnitude: 800.0 } },
];

static FIVE_LEVEL: [Entry<ResolutionSetting>; 5] = [
    Entry { label: "VeryLow", value: ResolutionSetting(30) },
    Entry { label: "Low", value: ResolutionSetting(60) },
    Entry { label: "Medium", value: ResolutionSetting(90) },
    Entry { label: "High", value: ResolutionSetting(120) },
    Entry { label: "VeryHigh", value: ResolutionSetting(150) },
];

static THREE_LEVEL: [Entry<ResolutionSetting>; 3] = [
    Entry { label: "Low", value: ResolutionSetting(60) },
    Entry { label: "Medium", value: ResolutionSetting(90) },
    Entry { label: "High", value: ResolutionSetting(120) },
];

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Selectors are 1-based and dense: row `n - 1` holds selector `n`.
fn lookup<T: Copy>(
    category: Category,
    table: &'static [Entry<T>],
    selector: u32,
) -> Result<T, JobError> {
    let max = table.len() as u32;
    if selector == 0 || selector > max {
        return Err(JobError::OutOfRangeSelector {
            category,
            selector,
            min: 1,
            max,
        });
    }
    Ok(table[(selector - 1) as usize].value)
}

fn labels<T>(table: &'static [Entry<T>]) -> Vec<(u32, &'static str)> {
    table
        .iter()
        .enumerate()
        .map(|(i, e)| (i as u32 + 1, e.label))
        .collect()
}

impl Category {
    /// Closed selector range `(min, max)` for this category.
    pub fn range(self) -> (u32, u32) {
        (1, self.entries().len() as u32)
    }

    /// Selector numbers and their human labels, in order.
    pub fn entries(self) -> Vec<(u32, &'static str)> {
        match self {
            Self::Material(MaterialFamily::Metal) => labels(&METALS),
            Self::Material(MaterialFamily::Resin) => labels(&RESINS),
            Self::UseCase => labels(&USE_CASES),
            Self::Precision(PrecisionScale::FiveLevel) => labels(&FIVE_LEVEL),
            Self::Precision(PrecisionScale::ThreeLevel) => labels(&THREE_LEVEL),
        }
    }

    /// Prompt-style summary such as `Low=1, Medium=2, High=3`.
    pub fn legend(self) -> String {
        self.entries()
            .iter()
            .map(|(n, label)| format!("{label}={n}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Resolve a selector within a category.
pub fn resolve(category: Category, selector: u32) -> Result<Profile, JobError> {
    let profile = match category {
        Category::Material(family) => Profile::Material(material(family, selector)?),
        Category::UseCase => Profile::UseCase(use_case(selector)?),
        Category::Precision(scale) => Profile::Resolution(resolution(scale, selector)?),
    };
    Ok(profile)
}

/// Resolve a material selector.
pub fn material(family: MaterialFamily, selector: u32) -> Result<MaterialProfile, JobError> {
    let table: &'static [Entry<MaterialProfile>] = match family {
        MaterialFamily::Metal => &METALS,
        MaterialFamily::Resin => &RESINS,
    };
    lookup(Category::Material(family), table, selector)
}

/// Resolve a use-case selector.
pub fn use_case(selector: u32) -> Result<UseCaseProfile, JobError> {
    lookup(Category::UseCase, &USE_CASES, selector)
}

/// Resolve a precision selector to a voxel resolution.
pub fn resolution(scale: PrecisionScale, selector: u32) -> Result<ResolutionSetting, JobError> {
    let table: &'static [Entry<ResolutionSetting>] = match scale {
        PrecisionScale::FiveLevel => &FIVE_LEVEL,
        PrecisionScale::ThreeLevel => &THREE_LEVEL,
    };
    lookup(Category::Precision(scale), table, selector)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
