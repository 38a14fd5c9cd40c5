//! Per-point scale estimation from local point density
//!
//! Each point's scale is the mean Euclidean distance to its K nearest
//! neighbors. Dense regions get small Gaussians and sparse regions large ones,
//! so neighboring primitives overlap enough to cover a surface.

pub mod knn;

pub use knn::{KnnBackend, Neighbor, NeighborSearch};
use knn::coordinate_key;

use crate::error::InitError;
use crate::stats::Summary;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use splatseed_data::{ArchiveError, ArrayArchive};
use tracing::{debug, info, warn};

/// Neighbors averaged per point.
pub const DEFAULT_NEIGHBORS: usize = 3;
/// max/mean scale ratio above which the estimate is flagged as outlier-heavy.
pub const DEFAULT_OUTLIER_RATIO: f64 = 100.0;
/// Name of the array in the scale artifact.
pub const SCALES_ARRAY: &str = "scales";

/// Configuration for scale estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Neighbors (K) averaged per point.
    pub neighbors: usize,
    /// Nearest-neighbor search structure.
    pub backend: KnnBackend,
    /// Warn when max(scale) / mean(scale) exceeds this.
    pub outlier_ratio: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            neighbors: DEFAULT_NEIGHBORS,
            backend: KnnBackend::default(),
            outlier_ratio: DEFAULT_OUTLIER_RATIO,
        }
    }
}

impl ScaleConfig {
    pub fn validate(&self) -> Result<(), InitError> {
        if self.neighbors == 0 {
            return Err(InitError::Config("scale.neighbors must be at least 1".into()));
        }
        if !(self.outlier_ratio.is_finite() && self.outlier_ratio > 0.0) {
            return Err(InitError::Config(format!(
                "scale.outlier_ratio must be a positive number, got {}",
                self.outlier_ratio
            )));
        }
        Ok(())
    }
}

/// Per-point scales, index-aligned with the point cloud they were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSet {
    values: Vec<f64>,
}

impl ScaleSet {
    /// Wrap raw values without checking them.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn stats(&self) -> Option<Summary> {
        Summary::of(self.values.iter().copied())
    }

    /// max / mean, `None` when empty or the mean is not positive.
    pub fn spread(&self) -> Option<f64> {
        self.stats()
            .filter(|s| s.mean > 0.0)
            .map(|s| s.max / s.mean)
    }

    /// Check the values are usable as Gaussian scales.
    ///
    /// Non-positive values are reported before non-finite ones.
    pub fn check(&self) -> Result<(), InitError> {
        let non_positive: Vec<usize> = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v <= 0.0)
            .map(|(i, _)| i)
            .collect();
        if let Some(&first_index) = non_positive.first() {
            return Err(InitError::InvalidScale {
                count: non_positive.len(),
                first_index,
            });
        }

        let non_finite = self.values.iter().filter(|v| !v.is_finite()).count();
        if non_finite > 0 {
            return Err(InitError::Numerical(format!(
                "{non_finite} scales are NaN or infinite"
            )));
        }
        Ok(())
    }

    /// The scale artifact: one `float64` array named `scales`.
    pub fn to_archive(&self) -> Result<ArrayArchive, ArchiveError> {
        let mut archive = ArrayArchive::new();
        archive.insert_f64(SCALES_ARRAY, &[self.values.len()], self.values.clone())?;
        Ok(archive)
    }

    /// Read the `scales` array from an artifact. `float32` arrays are widened.
    pub fn from_archive(archive: &ArrayArchive) -> Result<Self, InitError> {
        let array = archive
            .get(SCALES_ARRAY)
            .ok_or_else(|| ArchiveError::MissingArray(SCALES_ARRAY.to_string()))?;
        if array.shape.len() != 1 {
            return Err(InitError::ShapeMismatch {
                what: "scales array dimensions",
                expected: 1,
                found: array.shape.len(),
            });
        }
        Ok(Self::from_values(archive.to_f64_vec(SCALES_ARRAY)?))
    }
}

/// Computes [`ScaleSet`]s from point positions.
#[derive(Debug, Clone, Default)]
pub struct ScaleEstimator {
    config: ScaleConfig,
}

impl ScaleEstimator {
    pub fn new(config: ScaleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.config
    }

    /// Estimate one scale per position.
    ///
    /// Deterministic for a given input: neighbor ties break by lowest index and
    /// the mean of the K smallest distances does not depend on the tie-break.
    #[tracing::instrument(skip_all, fields(points = positions.len(), k = self.config.neighbors))]
    pub fn estimate(&self, positions: &[DVec3]) -> Result<ScaleSet, InitError> {
        self.config.validate()?;
        let n = positions.len();
        let k = self.config.neighbors;

        if n == 0 {
            return Err(InitError::EmptyInput("point cloud".into()));
        }
        if n < k + 1 {
            return Err(InitError::InsufficientPoints {
                found: n,
                required: k + 1,
                neighbors: k,
            });
        }
        if let Some(i) = positions.iter().position(|p| !p.is_finite()) {
            return Err(InitError::Numerical(format!(
                "point {i} has a non-finite position {}",
                positions[i]
            )));
        }

        let coincident = coincident_points(positions, k);
        if let Some(&first_index) = coincident.first() {
            return Err(InitError::InvalidScale {
                count: coincident.len(),
                first_index,
            });
        }

        let backend = self.config.backend.resolve(n);
        info!("Computing {k}-nearest-neighbor scales for {n} points ({backend})");
        let search = backend.build(positions);

        let values = (0..n)
            .map(|i| {
                let neighbors = search.nearest(i, k);
                neighbors.iter().map(|nb| nb.distance).sum::<f64>() / k as f64
            })
            .collect();
        let scales = ScaleSet::from_values(values);

        if let Some(stats) = scales.stats() {
            info!("Scale statistics:\n{stats}");
        }
        scales.check()?;

        if let Some(spread) = scales.spread() {
            if spread > self.config.outlier_ratio {
                warn!(
                    "Large scale variation (max/mean = {spread:.1}); the point cloud may contain outliers"
                );
            } else {
                debug!("Scale spread max/mean = {spread:.2}");
            }
        }

        Ok(scales)
    }
}

/// Sorted indices of points sharing their exact position with at least `k`
/// others. Each of them has `k` neighbors at distance zero.
fn coincident_points(positions: &[DVec3], k: usize) -> Vec<usize> {
    let key = |i: usize| positions[i].to_array().map(coordinate_key);
    let mut order: Vec<usize> = (0..positions.len()).collect();
    order.sort_unstable_by_key(|&i| key(i));

    let mut coincident: Vec<usize> = order
        .chunk_by(|&a, &b| key(a) == key(b))
        .filter(|group| group.len() > k)
        .flatten()
        .copied()
        .collect();
    coincident.sort_unstable();
    coincident
}
