//! Serializable camera records.

use serde::{Deserialize, Serialize};

/// Projection parameters of a rectilinear (undistorted) camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub model: String,
    pub width: u64,
    pub height: u64,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// World-to-camera pose of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub image_id: u32,
    pub image_name: String,
    /// Rotation matrix, row-major.
    #[serde(rename = "R")]
    pub rotation: [[f64; 3]; 3],
    #[serde(rename = "t")]
    pub translation: [f64; 3],
    /// Hamilton quaternion, scalar first (w, x, y, z).
    pub qvec: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub num_cameras: usize,
    pub num_images: usize,
    #[serde(rename = "num_points3D")]
    pub num_points3d: usize,
}

/// The camera artifact: shared intrinsics, one pose per image, and counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub intrinsics: Intrinsics,
    pub extrinsics: Vec<CameraPose>,
    pub metadata: RecordMetadata,
}

impl CameraRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
