//! Exhaustive invariant checks over an assembled parameter set.
//!
//! Every check runs and every failure is collected, so a single pass yields
//! the complete diagnostic.

use super::{GaussianParams, IDENTITY_ROTATION};
use std::fmt;

/// One violated invariant and how many values violate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NonPositiveScales { count: usize },
    OpacitiesOutOfRange { count: usize },
    ColorsOutOfRange { count: usize },
    NonIdentityRotations { count: usize },
    NotANumber { field: &'static str, count: usize },
    Infinite { field: &'static str, count: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveScales { count } => write!(f, "found {count} non-positive scales"),
            Self::OpacitiesOutOfRange { count } => {
                write!(f, "{count} opacities outside [0, 1]")
            }
            Self::ColorsOutOfRange { count } => {
                write!(f, "{count} color channels outside [0, 1]")
            }
            Self::NonIdentityRotations { count } => {
                write!(f, "{count} rotations are not the identity quaternion")
            }
            Self::NotANumber { field, count } => write!(f, "{count} NaN values in {field}"),
            Self::Infinite { field, count } => write!(f, "{count} infinite values in {field}"),
        }
    }
}

fn out_of_unit_range(v: f32) -> bool {
    v < 0.0 || v > 1.0
}

fn count_where(values: &[f32], predicate: impl Fn(f32) -> bool) -> usize {
    values.iter().filter(|&&v| predicate(v)).count()
}

/// Run every check and return all violations, in a fixed order.
pub fn validate(params: &GaussianParams) -> Vec<Violation> {
    let mut violations = Vec::new();
    let means = params.means().as_flattened();
    let scales = params.scales();
    let rotations = params.rotations();
    let opacities = params.opacities();
    let colors = params.colors().as_flattened();

    // NaN compares false, so NaN entries are left to the NaN check below.
    let count = count_where(scales, |v| v <= 0.0);
    if count > 0 {
        violations.push(Violation::NonPositiveScales { count });
    }

    let count = count_where(opacities, out_of_unit_range);
    if count > 0 {
        violations.push(Violation::OpacitiesOutOfRange { count });
    }

    let count = count_where(colors, out_of_unit_range);
    if count > 0 {
        violations.push(Violation::ColorsOutOfRange { count });
    }

    let count = rotations.iter().filter(|&&q| q != IDENTITY_ROTATION).count();
    if count > 0 {
        violations.push(Violation::NonIdentityRotations { count });
    }

    let fields: [(&'static str, &[f32]); 5] = [
        ("means", means),
        ("scales", scales),
        ("rotations", rotations.as_flattened()),
        ("opacities", opacities),
        ("colors", colors),
    ];
    for (field, values) in fields {
        let count = count_where(values, f32::is_nan);
        if count > 0 {
            violations.push(Violation::NotANumber { field, count });
        }
        let count = count_where(values, f32::is_infinite);
        if count > 0 {
            violations.push(Violation::Infinite { field, count });
        }
    }

    violations
}
