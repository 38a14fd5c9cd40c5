//! Error taxonomy for the initialization stages.

use crate::params::Violation;
use splatseed_data::{ArchiveError, ColmapError, PlyError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that terminate an initialization stage.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("required input not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("{0} is empty")]
    EmptyInput(String),

    #[error("shape mismatch: {what} has {found} entries, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{neighbors}-nearest-neighbor scales need at least {required} points, got {found}")]
    InsufficientPoints {
        found: usize,
        required: usize,
        neighbors: usize,
    },

    #[error("{count} points have non-positive scale (first at index {first_index}); the cloud likely contains duplicate points")]
    InvalidScale { count: usize, first_index: usize },

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("parameter validation failed: {}", format_violations(.0))]
    ParameterValidation(Vec<Violation>),

    #[error("camera {camera_id} uses unsupported model {model} with {params} parameters")]
    UnsupportedCameraModel {
        camera_id: u32,
        model: String,
        params: usize,
    },

    #[error("reconstruction contains {cameras} cameras and {images} images")]
    EmptyReconstruction { cameras: usize, images: usize },

    #[error("failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read point cloud: {0}")]
    Ply(#[from] PlyError),

    #[error("failed to read reconstruction: {0}")]
    Colmap(#[from] ColmapError),

    #[error("failed to read array archive: {0}")]
    Archive(#[from] ArchiveError),
}

impl InitError {
    pub(crate) fn persistence(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
