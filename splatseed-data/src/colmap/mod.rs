//! COLMAP sparse reconstruction reading
//!
//! Supports both the text (`cameras.txt`, `images.txt`, `points3D.txt`) and the
//! binary (`cameras.bin`, `images.bin`, `points3D.bin`) model layouts.

mod binary;
mod model;
mod text;

pub use model::{Camera, CameraModel, Image, Point3D, Reconstruction, Rigid3, Rotation};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading a COLMAP model.
#[derive(Debug, Error)]
pub enum ColmapError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("unknown camera model {0}")]
    UnknownModel(String),
    #[error("no COLMAP model (cameras.bin or cameras.txt) in {}", .0.display())]
    MissingModel(PathBuf),
}

impl ColmapError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// On-disk encoding of a sparse model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Binary,
    Text,
}

impl ModelFormat {
    /// Detect the model format in `dir`, preferring binary when both exist.
    pub fn detect(dir: &Path) -> Option<Self> {
        if dir.join("cameras.bin").is_file() {
            Some(Self::Binary)
        } else if dir.join("cameras.txt").is_file() {
            Some(Self::Text)
        } else {
            None
        }
    }
}

impl Reconstruction {
    /// Read a sparse model from `dir`, auto-detecting its format.
    #[tracing::instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn read(dir: impl AsRef<Path>) -> Result<Self, ColmapError> {
        let dir = dir.as_ref();
        let reconstruction = match ModelFormat::detect(dir) {
            Some(ModelFormat::Binary) => binary::read_model(dir)?,
            Some(ModelFormat::Text) => text::read_model(dir)?,
            None => return Err(ColmapError::MissingModel(dir.to_path_buf())),
        };
        tracing::info!(
            "Loaded reconstruction with {} cameras, {} images, {} points",
            reconstruction.cameras.len(),
            reconstruction.images.len(),
            reconstruction.points3d.len()
        );
        Ok(reconstruction)
    }

    /// Read a text model from `dir`.
    pub fn read_text(dir: impl AsRef<Path>) -> Result<Self, ColmapError> {
        text::read_model(dir.as_ref())
    }

    /// Read a binary model from `dir`.
    pub fn read_binary(dir: impl AsRef<Path>) -> Result<Self, ColmapError> {
        binary::read_model(dir.as_ref())
    }

    /// Write this model in the text layout.
    pub fn write_text(&self, dir: impl AsRef<Path>) -> Result<(), ColmapError> {
        text::write_model(self, dir.as_ref())
    }
}
