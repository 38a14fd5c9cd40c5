//! Splatseed Initialization Crate
//!
//! Prepares the starting point of a 3D Gaussian Splatting optimization from a
//! sparse structure-from-motion reconstruction.
//!
//! ## Modules
//!
//! - [`scale`]: per-point isotropic scales from K-nearest-neighbor distances
//! - [`params`]: assembly and validation of the per-Gaussian parameter set
//! - [`cameras`]: intrinsics and world-to-camera poses in matrix and quaternion form
//! - [`quality`]: diagnostic checks over a raw point cloud
//! - [`stages`]: path-based stage runners that persist artifacts atomically

pub mod cameras;
pub mod config;
pub mod error;
pub mod params;
pub mod quality;
pub mod scale;
pub mod stages;
pub mod stats;

pub use cameras::{CameraConfig, CameraExtractor, CameraRecord, CameraSelection, Extraction};
pub use config::InitConfig;
pub use error::InitError;
pub use params::{GaussianParams, ParamsAssembler, ParamsConfig, Violation};
pub use quality::{QualityConfig, QualityReport, QualityWarning};
pub use scale::{KnnBackend, ScaleConfig, ScaleEstimator, ScaleSet};
pub use stats::Summary;
