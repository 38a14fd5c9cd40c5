//! In-memory COLMAP model types

use crate::types::PointCloud;
use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::ColmapError;

/// Camera projection models known to COLMAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraModel {
    SimplePinhole,
    Pinhole,
    SimpleRadial,
    Radial,
    Opencv,
    OpencvFisheye,
    FullOpencv,
    Fov,
    SimpleRadialFisheye,
    RadialFisheye,
    ThinPrismFisheye,
}

impl CameraModel {
    const ALL: [CameraModel; 11] = [
        Self::SimplePinhole,
        Self::Pinhole,
        Self::SimpleRadial,
        Self::Radial,
        Self::Opencv,
        Self::OpencvFisheye,
        Self::FullOpencv,
        Self::Fov,
        Self::SimpleRadialFisheye,
        Self::RadialFisheye,
        Self::ThinPrismFisheye,
    ];

    /// Numeric id used by the binary model format.
    pub fn id(self) -> i32 {
        match self {
            Self::SimplePinhole => 0,
            Self::Pinhole => 1,
            Self::SimpleRadial => 2,
            Self::Radial => 3,
            Self::Opencv => 4,
            Self::OpencvFisheye => 5,
            Self::FullOpencv => 6,
            Self::Fov => 7,
            Self::SimpleRadialFisheye => 8,
            Self::RadialFisheye => 9,
            Self::ThinPrismFisheye => 10,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }

    /// Name used by the text model format.
    pub fn name(self) -> &'static str {
        match self {
            Self::SimplePinhole => "SIMPLE_PINHOLE",
            Self::Pinhole => "PINHOLE",
            Self::SimpleRadial => "SIMPLE_RADIAL",
            Self::Radial => "RADIAL",
            Self::Opencv => "OPENCV",
            Self::OpencvFisheye => "OPENCV_FISHEYE",
            Self::FullOpencv => "FULL_OPENCV",
            Self::Fov => "FOV",
            Self::SimpleRadialFisheye => "SIMPLE_RADIAL_FISHEYE",
            Self::RadialFisheye => "RADIAL_FISHEYE",
            Self::ThinPrismFisheye => "THIN_PRISM_FISHEYE",
        }
    }

    /// Number of intrinsic parameters the model carries.
    pub fn num_params(self) -> usize {
        match self {
            Self::SimplePinhole => 3,
            Self::Pinhole => 4,
            Self::SimpleRadial => 4,
            Self::Radial => 5,
            Self::Opencv => 8,
            Self::OpencvFisheye => 8,
            Self::FullOpencv => 12,
            Self::Fov => 5,
            Self::SimpleRadialFisheye => 4,
            Self::RadialFisheye => 5,
            Self::ThinPrismFisheye => 12,
        }
    }
}

impl fmt::Display for CameraModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CameraModel {
    type Err = ColmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| ColmapError::UnknownModel(s.to_string()))
    }
}

/// A physical camera and its intrinsic parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub camera_id: u32,
    pub model: CameraModel,
    pub width: u64,
    pub height: u64,
    /// Model-specific parameters in COLMAP order (PINHOLE: fx, fy, cx, cy).
    pub params: Vec<f64>,
}

/// A rotation as stored by the reconstruction.
///
/// Exposes both a 3x3 matrix and the quaternion in the (x, y, z, w) order
/// glam uses natively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    quat: DQuat,
}

impl Rotation {
    /// Build from a Hamilton quaternion given scalar first, as COLMAP files store it.
    /// The quaternion is normalized.
    pub fn from_wxyz(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            quat: DQuat::from_xyzw(x, y, z, w).normalize(),
        }
    }

    /// Build from a rotation matrix.
    pub fn from_matrix(matrix: &DMat3) -> Self {
        Self {
            quat: DQuat::from_mat3(matrix).normalize(),
        }
    }

    pub fn quat(&self) -> DQuat {
        self.quat
    }

    /// Quaternion components in (x, y, z, w) order.
    pub fn quat_xyzw(&self) -> [f64; 4] {
        self.quat.to_array()
    }

    pub fn matrix(&self) -> DMat3 {
        DMat3::from_quat(self.quat)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            quat: DQuat::IDENTITY,
        }
    }
}

/// A rigid transform. For images this is the world-to-camera transform.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rigid3 {
    pub rotation: Rotation,
    pub translation: DVec3,
}

impl Rigid3 {
    pub fn new(rotation: Rotation, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation.quat() * point + self.translation
    }
}

/// A registered image and its pose.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub image_id: u32,
    pub camera_id: u32,
    pub name: String,
    pub cam_from_world: Rigid3,
}

/// A triangulated 3D point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point3D {
    pub point3d_id: u64,
    pub xyz: DVec3,
    pub color: [u8; 3],
    pub error: f64,
    /// Observations as (image_id, point2d_idx).
    pub track: Vec<(u32, u32)>,
}

/// A sparse reconstruction. Maps iterate in ascending id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconstruction {
    pub cameras: BTreeMap<u32, Camera>,
    pub images: BTreeMap<u32, Image>,
    pub points3d: BTreeMap<u64, Point3D>,
}

impl Reconstruction {
    /// The triangulated points as a colored point cloud, in id order.
    pub fn point_cloud(&self) -> PointCloud {
        let positions = self.points3d.values().map(|p| p.xyz).collect();
        let colors = self
            .points3d
            .values()
            .map(|p| DVec3::new(p.color[0] as f64, p.color[1] as f64, p.color[2] as f64) / 255.0)
            .collect();
        PointCloud::new(positions, colors)
    }
}
