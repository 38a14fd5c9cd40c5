//! Point cloud quality report
//!
//! Diagnostic checks run over a raw cloud before initialization. Non-finite
//! coordinates are fatal; everything else is reported as a warning.

use crate::error::InitError;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use splatseed_data::PointCloud;
use std::fmt;
use tracing::{info, warn};

pub const DEFAULT_MIN_POINTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Clouds with fewer points get a sparsity warning.
    pub min_points: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

/// Non-fatal findings.
#[derive(Debug, Clone, PartialEq)]
pub enum QualityWarning {
    ColorsOutOfRange { min: f64, max: f64 },
    Sparse { count: usize, min_points: usize },
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColorsOutOfRange { min, max } => write!(
                f,
                "color values span [{min:.3}, {max:.3}], outside the expected [0, 1] range"
            ),
            Self::Sparse { count, min_points } => write!(
                f,
                "only {count} points (fewer than {min_points}); the reconstruction might need more images"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub count: usize,
    pub bbox_min: DVec3,
    pub bbox_max: DVec3,
    /// `(min, max)` over all color channels, `None` for an uncolored cloud.
    pub color_range: Option<(f64, f64)>,
    pub warnings: Vec<QualityWarning>,
}

impl QualityReport {
    pub fn bbox_size(&self) -> DVec3 {
        self.bbox_max - self.bbox_min
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Inspect `cloud` and build a [`QualityReport`].
#[tracing::instrument(skip_all, fields(points = cloud.len()))]
pub fn analyze(cloud: &PointCloud, config: &QualityConfig) -> Result<QualityReport, InitError> {
    if cloud.is_empty() {
        return Err(InitError::EmptyInput("point cloud".into()));
    }
    let invalid = cloud.positions.iter().filter(|p| !p.is_finite()).count();
    if invalid > 0 {
        return Err(InitError::Numerical(format!(
            "point cloud contains {invalid} points with NaN or infinite coordinates"
        )));
    }
    info!("No invalid values found");

    let (bbox_min, bbox_max) = cloud.positions.iter().fold(
        (DVec3::splat(f64::INFINITY), DVec3::splat(f64::NEG_INFINITY)),
        |(lo, hi), &p| (lo.min(p), hi.max(p)),
    );

    let mut warnings = Vec::new();
    let color_range = cloud.colors().map(|colors| {
        colors.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c.min_element()), hi.max(c.max_element()))
        })
    });
    match color_range {
        Some((min, max)) if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) => {
            warnings.push(QualityWarning::ColorsOutOfRange { min, max });
        }
        Some(_) => info!("Color values are valid"),
        None => info!("No color information found"),
    }

    if cloud.len() < config.min_points {
        warnings.push(QualityWarning::Sparse {
            count: cloud.len(),
            min_points: config.min_points,
        });
    }
    for warning in &warnings {
        warn!("{warning}");
    }

    Ok(QualityReport {
        count: cloud.len(),
        bbox_min,
        bbox_max,
        color_range,
        warnings,
    })
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Point count: {}", self.count)?;
        writeln!(f, "Bounding box:")?;
        let size = self.bbox_size();
        for (axis, i) in [("X", 0), ("Y", 1), ("Z", 2)] {
            writeln!(
                f,
                "  {axis}: [{:.2}, {:.2}] (size: {:.2})",
                self.bbox_min[i], self.bbox_max[i], size[i]
            )?;
        }
        match self.color_range {
            Some((min, max)) => writeln!(f, "Color range: [{min:.3}, {max:.3}]")?,
            None => writeln!(f, "Color range: none")?,
        }
        if self.warnings.is_empty() {
            write!(f, "No warnings")
        } else {
            write!(f, "Warnings:")?;
            for warning in &self.warnings {
                write!(f, "\n  - {warning}")?;
            }
            Ok(())
        }
    }
}
