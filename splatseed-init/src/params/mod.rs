//! Gaussian parameter assembly
//!
//! Turns a point cloud and its scale set into the frozen initialization
//! snapshot a splatting trainer starts from: means, scales, identity
//! rotations, constant opacities and colors, all `f32`.

mod summary;
mod validation;

pub use summary::ParamsSummary;
pub use validation::{Violation, validate};

use crate::error::InitError;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use splatseed_data::{ArchiveError, ArrayArchive};
use tracing::{debug, info};

/// Identity quaternion, scalar first (w, x, y, z).
pub const IDENTITY_ROTATION: [f32; 4] = [1.0, 0.0, 0.0, 0.0];
pub const DEFAULT_OPACITY: f32 = 0.1;
/// Mid-gray used when the cloud carries no color.
pub const DEFAULT_COLOR: [f32; 3] = [0.5, 0.5, 0.5];

pub const MEANS_ARRAY: &str = "means";
pub const SCALES_ARRAY: &str = "scales";
pub const ROTATIONS_ARRAY: &str = "rotations";
pub const OPACITIES_ARRAY: &str = "opacities";
pub const COLORS_ARRAY: &str = "colors";

/// Configuration for parameter assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsConfig {
    /// Opacity every Gaussian starts with.
    pub initial_opacity: f32,
    /// Color used for every point when the cloud is uncolored.
    pub default_color: [f32; 3],
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            initial_opacity: DEFAULT_OPACITY,
            default_color: DEFAULT_COLOR,
        }
    }
}

impl ParamsConfig {
    pub fn validate(&self) -> Result<(), InitError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.initial_opacity) {
            return Err(InitError::Config(format!(
                "params.initial_opacity must lie in [0, 1], got {}",
                self.initial_opacity
            )));
        }
        if !self.default_color.iter().all(|c| unit.contains(c)) {
            return Err(InitError::Config(format!(
                "params.default_color must lie in [0, 1], got {:?}",
                self.default_color
            )));
        }
        Ok(())
    }
}

/// Initial parameters for N Gaussians. All arrays share the leading dimension N.
///
/// Read-only once built; training owns its own mutable copy.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianParams {
    means: Vec<[f32; 3]>,
    scales: Vec<f32>,
    rotations: Vec<[f32; 4]>,
    opacities: Vec<f32>,
    colors: Vec<[f32; 3]>,
}

impl GaussianParams {
    /// Build from parts, checking only that the lengths agree.
    pub fn from_parts(
        means: Vec<[f32; 3]>,
        scales: Vec<f32>,
        rotations: Vec<[f32; 4]>,
        opacities: Vec<f32>,
        colors: Vec<[f32; 3]>,
    ) -> Result<Self, InitError> {
        let n = means.len();
        for (what, found) in [
            ("scales", scales.len()),
            ("rotations", rotations.len()),
            ("opacities", opacities.len()),
            ("colors", colors.len()),
        ] {
            if found != n {
                return Err(InitError::ShapeMismatch {
                    what,
                    expected: n,
                    found,
                });
            }
        }
        Ok(Self {
            means,
            scales,
            rotations,
            opacities,
            colors,
        })
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    pub fn means(&self) -> &[[f32; 3]] {
        &self.means
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    /// Quaternions in (w, x, y, z) order.
    pub fn rotations(&self) -> &[[f32; 4]] {
        &self.rotations
    }

    pub fn opacities(&self) -> &[f32] {
        &self.opacities
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    /// All invariant violations; empty when the set is valid.
    pub fn validate(&self) -> Vec<Violation> {
        validate(self)
    }

    pub fn summary(&self) -> ParamsSummary {
        ParamsSummary::of(self)
    }

    /// The parameter artifact: five `float32` arrays.
    pub fn to_archive(&self) -> Result<ArrayArchive, ArchiveError> {
        let n = self.len();
        let mut archive = ArrayArchive::new();
        archive.insert_f32(MEANS_ARRAY, &[n, 3], self.means.as_flattened().to_vec())?;
        archive.insert_f32(SCALES_ARRAY, &[n], self.scales.clone())?;
        archive.insert_f32(ROTATIONS_ARRAY, &[n, 4], self.rotations.as_flattened().to_vec())?;
        archive.insert_f32(OPACITIES_ARRAY, &[n], self.opacities.clone())?;
        archive.insert_f32(COLORS_ARRAY, &[n, 3], self.colors.as_flattened().to_vec())?;
        Ok(archive)
    }

    /// Read a parameter artifact. The arrays are not re-validated.
    pub fn from_archive(archive: &ArrayArchive) -> Result<Self, InitError> {
        let (shape, means) = archive.f32_array(MEANS_ARRAY)?;
        let n = shape.first().copied().unwrap_or(0);

        let rows = |name: &'static str, width: Option<usize>| -> Result<&[f32], InitError> {
            let (shape, values) = archive.f32_array(name)?;
            let expected: Vec<usize> = std::iter::once(n).chain(width).collect();
            if shape != expected.as_slice() {
                return Err(InitError::ShapeMismatch {
                    what: name,
                    expected: expected.iter().product(),
                    found: values.len(),
                });
            }
            Ok(values)
        };

        rows(MEANS_ARRAY, Some(3))?;
        Self::from_parts(
            chunks(means),
            rows(SCALES_ARRAY, None)?.to_vec(),
            chunks(rows(ROTATIONS_ARRAY, Some(4))?),
            rows(OPACITIES_ARRAY, None)?.to_vec(),
            chunks(rows(COLORS_ARRAY, Some(3))?),
        )
    }
}

fn chunks<const W: usize>(values: &[f32]) -> Vec<[f32; W]> {
    values
        .chunks_exact(W)
        .map(|c| {
            let mut row = [0.0; W];
            row.copy_from_slice(c);
            row
        })
        .collect()
}

fn to_f32(v: DVec3) -> [f32; 3] {
    v.as_vec3().to_array()
}

/// Builds and validates [`GaussianParams`].
#[derive(Debug, Clone, Default)]
pub struct ParamsAssembler {
    config: ParamsConfig,
}

impl ParamsAssembler {
    pub fn new(config: ParamsConfig) -> Self {
        Self { config }
    }

    /// Assemble parameters for `positions` with index-aligned `scales`.
    ///
    /// `colors` that are `None` or empty are replaced by the configured
    /// default. Fails with [`InitError::ParameterValidation`] listing every
    /// violated invariant.
    #[tracing::instrument(skip_all, fields(points = positions.len()))]
    pub fn assemble(
        &self,
        positions: &[DVec3],
        colors: Option<&[DVec3]>,
        scales: &[f64],
    ) -> Result<GaussianParams, InitError> {
        let n = positions.len();
        if n == 0 {
            return Err(InitError::EmptyInput("point cloud".into()));
        }
        if scales.len() != n {
            return Err(InitError::ShapeMismatch {
                what: "scales",
                expected: n,
                found: scales.len(),
            });
        }

        let colors = match colors {
            Some(colors) if !colors.is_empty() => {
                if colors.len() != n {
                    return Err(InitError::ShapeMismatch {
                        what: "colors",
                        expected: n,
                        found: colors.len(),
                    });
                }
                colors.iter().map(|&c| to_f32(c)).collect()
            }
            _ => {
                info!("No colors found, using default {:?}", self.config.default_color);
                vec![self.config.default_color; n]
            }
        };

        let params = GaussianParams {
            means: positions.iter().map(|&p| to_f32(p)).collect(),
            scales: scales.iter().map(|&s| s as f32).collect(),
            rotations: vec![IDENTITY_ROTATION; n],
            opacities: vec![self.config.initial_opacity; n],
            colors,
        };
        debug!(
            "Parameters created: means {:?}, scales {:?}, rotations {:?}, opacities {:?}, colors {:?}",
            (n, 3),
            (n,),
            (n, 4),
            (n,),
            (n, 3)
        );

        let violations = params.validate();
        if !violations.is_empty() {
            return Err(InitError::ParameterValidation(violations));
        }
        info!("All {n} Gaussians passed validation");
        Ok(params)
    }
}
