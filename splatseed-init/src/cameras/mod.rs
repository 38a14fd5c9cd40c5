//! Camera intrinsics and pose extraction from a sparse reconstruction
//!
//! Poses are world-to-camera. Rotations are emitted both as a row-major 3x3
//! matrix and as a Hamilton quaternion with the scalar first.

mod record;

pub use record::{CameraPose, CameraRecord, Intrinsics, RecordMetadata};

use crate::error::InitError;
use glam::DMat3;
use serde::{Deserialize, Serialize};
use splatseed_data::{Camera, CameraModel, Image, Reconstruction};
use tracing::{debug, info, warn};

/// Allowed deviation of det(R) from 1.
pub const DEFAULT_ROTATION_TOLERANCE: f64 = 1e-3;
/// Allowed element-wise deviation between R and the matrix rebuilt from qvec.
pub const QUATERNION_TOLERANCE: f64 = 1e-6;

/// Which camera supplies the shared intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSelection {
    /// Lowest camera id.
    #[default]
    First,
    ById(u32),
}

/// Configuration for camera extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub selection: CameraSelection,
    /// Models accepted for the selected camera. Only rectilinear models
    /// (PINHOLE, SIMPLE_PINHOLE) can be converted.
    pub supported_models: Vec<CameraModel>,
    pub rotation_tolerance: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            selection: CameraSelection::First,
            supported_models: vec![CameraModel::Pinhole],
            rotation_tolerance: DEFAULT_ROTATION_TOLERANCE,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), InitError> {
        if let Some(model) = self
            .supported_models
            .iter()
            .find(|m| !matches!(m, CameraModel::Pinhole | CameraModel::SimplePinhole))
        {
            return Err(InitError::Config(format!(
                "cameras.supported_models: {model} has distortion and cannot be converted"
            )));
        }
        if !(self.rotation_tolerance.is_finite() && self.rotation_tolerance > 0.0) {
            return Err(InitError::Config(format!(
                "cameras.rotation_tolerance must be positive, got {}",
                self.rotation_tolerance
            )));
        }
        Ok(())
    }
}

/// Result of an extraction: the record plus non-fatal diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: CameraRecord,
    /// Poses whose |det(R) - 1| exceeds the tolerance.
    pub invalid_rotations: usize,
    /// Poses whose qvec does not reproduce R.
    pub quaternion_mismatches: usize,
    pub mean_translation_norm: f64,
}

/// Rotation matrix (row-major) of a unit quaternion given as (w, x, y, z).
pub fn quaternion_to_rotation_matrix(qvec: [f64; 4]) -> [[f64; 3]; 3] {
    let [w, x, y, z] = qvec;
    [
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
        ],
        [
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
        ],
        [
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        ],
    ]
}

fn rows(matrix: &DMat3) -> [[f64; 3]; 3] {
    [0, 1, 2].map(|r| matrix.row(r).to_array())
}

/// Largest elementwise difference; NaN if any entry is NaN.
fn max_abs_diff(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> f64 {
    a.as_flattened()
        .iter()
        .zip(b.as_flattened())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, |acc, d| if d.is_nan() || d > acc { d } else { acc })
}

/// Converts a [`Reconstruction`] into a [`CameraRecord`].
#[derive(Debug, Clone, Default)]
pub struct CameraExtractor {
    config: CameraConfig,
}

impl CameraExtractor {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(skip_all, fields(cameras = reconstruction.cameras.len(), images = reconstruction.images.len()))]
    pub fn extract(&self, reconstruction: &Reconstruction) -> Result<Extraction, InitError> {
        self.config.validate()?;
        let num_cameras = reconstruction.cameras.len();
        let num_images = reconstruction.images.len();
        if num_cameras == 0 || num_images == 0 {
            return Err(InitError::EmptyReconstruction {
                cameras: num_cameras,
                images: num_images,
            });
        }

        let camera = self.select_camera(reconstruction)?;
        let intrinsics = self.intrinsics(camera)?;
        info!(
            "Camera intrinsics: {} {}x{}, fx={:.2} fy={:.2}, cx={:.2} cy={:.2}",
            intrinsics.model,
            intrinsics.width,
            intrinsics.height,
            intrinsics.fx,
            intrinsics.fy,
            intrinsics.cx,
            intrinsics.cy
        );

        let foreign = reconstruction
            .images
            .values()
            .filter(|image| image.camera_id != camera.camera_id)
            .count();
        if foreign > 0 {
            warn!(
                "{foreign} images use a camera other than {}; their intrinsics are ignored",
                camera.camera_id
            );
        }

        let mut invalid_rotations = 0;
        let mut quaternion_mismatches = 0;
        let mut translation_norm_sum = 0.0;
        let mut extrinsics = Vec::with_capacity(num_images);

        for image in reconstruction.images.values() {
            let pose = Self::pose(image);

            let det = DMat3::from_cols_array_2d(&pose.rotation).determinant();
            if !det.is_finite() || (det - 1.0).abs() > self.config.rotation_tolerance {
                debug!("Image {} has det(R) = {det}", image.image_id);
                invalid_rotations += 1;
            }
            let rebuilt = quaternion_to_rotation_matrix(pose.qvec);
            let diff = max_abs_diff(&rebuilt, &pose.rotation);
            if diff.is_nan() || diff > QUATERNION_TOLERANCE {
                debug!("Image {} qvec does not reproduce R", image.image_id);
                quaternion_mismatches += 1;
            }
            translation_norm_sum += glam::DVec3::from_array(pose.translation).length();

            extrinsics.push(pose);
        }

        info!("Extracted {} camera poses", extrinsics.len());
        if invalid_rotations > 0 {
            warn!("{invalid_rotations} rotation matrices may be invalid");
        } else {
            info!("All rotation matrices valid");
        }
        if quaternion_mismatches > 0 {
            warn!("{quaternion_mismatches} quaternions disagree with their rotation matrix");
        }
        let mean_translation_norm = translation_norm_sum / extrinsics.len() as f64;
        info!("Translation vector norms: mean={mean_translation_norm:.3}");

        Ok(Extraction {
            record: CameraRecord {
                intrinsics,
                extrinsics,
                metadata: RecordMetadata {
                    num_cameras,
                    num_images,
                    num_points3d: reconstruction.points3d.len(),
                },
            },
            invalid_rotations,
            quaternion_mismatches,
            mean_translation_norm,
        })
    }

    fn select_camera<'a>(&self, reconstruction: &'a Reconstruction) -> Result<&'a Camera, InitError> {
        match self.config.selection {
            CameraSelection::First => reconstruction.cameras.values().next().ok_or(
                InitError::EmptyReconstruction {
                    cameras: 0,
                    images: reconstruction.images.len(),
                },
            ),
            CameraSelection::ById(id) => reconstruction
                .cameras
                .get(&id)
                .ok_or_else(|| InitError::Config(format!("camera {id} not in reconstruction"))),
        }
    }

    fn intrinsics(&self, camera: &Camera) -> Result<Intrinsics, InitError> {
        let unsupported = || InitError::UnsupportedCameraModel {
            camera_id: camera.camera_id,
            model: camera.model.to_string(),
            params: camera.params.len(),
        };
        if !self.config.supported_models.contains(&camera.model) {
            return Err(unsupported());
        }

        let (fx, fy, cx, cy) = match (camera.model, camera.params.as_slice()) {
            (CameraModel::Pinhole, &[fx, fy, cx, cy]) => (fx, fy, cx, cy),
            (CameraModel::SimplePinhole, &[f, cx, cy]) => (f, f, cx, cy),
            _ => return Err(unsupported()),
        };

        Ok(Intrinsics {
            model: CameraModel::Pinhole.name().to_string(),
            width: camera.width,
            height: camera.height,
            fx,
            fy,
            cx,
            cy,
        })
    }

    fn pose(image: &Image) -> CameraPose {
        let rotation = image.cam_from_world.rotation;
        // Relabel (x, y, z, w) to scalar-first; no recomputation.
        let [x, y, z, w] = rotation.quat_xyzw();
        CameraPose {
            image_id: image.image_id,
            image_name: image.name.clone(),
            rotation: rows(&rotation.matrix()),
            translation: image.cam_from_world.translation.to_array(),
            qvec: [w, x, y, z],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DQuat, DVec3};
    use splatseed_data::{Rigid3, Rotation};

    fn camera(model: CameraModel, params: Vec<f64>) -> Camera {
        Camera {
            camera_id: 1,
            model,
            width: 800,
            height: 600,
            params,
        }
    }

    fn image(id: u32, rotation: Rotation, translation: DVec3) -> Image {
        Image {
            image_id: id,
            camera_id: 1,
            name: format!("img_{id:03}.jpg"),
            cam_from_world: Rigid3::new(rotation, translation),
        }
    }

    fn reconstruction(camera: Camera, images: Vec<Image>) -> Reconstruction {
        let mut rec = Reconstruction::default();
        rec.cameras.insert(camera.camera_id, camera);
        for image in images {
            rec.images.insert(image.image_id, image);
        }
        rec
    }

    fn known_rotation() -> DMat3 {
        DMat3::from_quat(DQuat::from_euler(glam::EulerRot::ZYX, 0.3, -1.1, 2.4))
    }

    #[test]
    fn test_known_pose_round_trips() {
        let r0 = known_rotation();
        let t0 = DVec3::new(0.125, -3.5, 7.0);
        let rec = reconstruction(
            camera(CameraModel::Pinhole, vec![500.0, 510.0, 400.0, 300.0]),
            vec![image(1, Rotation::from_matrix(&r0), t0)],
        );

        let extraction = CameraExtractor::default().extract(&rec).unwrap();
        let pose = &extraction.record.extrinsics[0];
        let expected = rows(&r0);

        assert!(max_abs_diff(&pose.rotation, &expected) < 1e-6);
        assert_eq!(pose.translation, [0.125, -3.5, 7.0]);
        let rebuilt = quaternion_to_rotation_matrix(pose.qvec);
        assert!(max_abs_diff(&rebuilt, &expected) < 1e-6);
        assert_eq!(extraction.invalid_rotations, 0);
        assert_eq!(extraction.quaternion_mismatches, 0);
    }

    #[test]
    fn test_degenerate_quaternion_is_counted_invalid() {
        let rec = reconstruction(
            camera(CameraModel::Pinhole, vec![500.0, 510.0, 400.0, 300.0]),
            vec![
                image(1, Rotation::from_matrix(&known_rotation()), DVec3::ZERO),
                image(2, Rotation::from_wxyz(0.0, 0.0, 0.0, 0.0), DVec3::X),
            ],
        );

        let extraction = CameraExtractor::default().extract(&rec).unwrap();
        assert_eq!(extraction.record.extrinsics.len(), 2);
        assert_eq!(extraction.invalid_rotations, 1);
        assert_eq!(extraction.quaternion_mismatches, 1);
        assert!(extraction.record.extrinsics[1].rotation[0][0].is_nan());
    }

    #[test]
    fn test_qvec_is_scalar_first_relabeling() {
        let rotation = Rotation::from_wxyz(0.5, 0.5, -0.5, 0.5);
        let rec = reconstruction(
            camera(CameraModel::Pinhole, vec![1.0, 1.0, 0.5, 0.5]),
            vec![image(4, rotation, DVec3::ZERO)],
        );
        let extraction = CameraExtractor::default().extract(&rec).unwrap();
        let [x, y, z, w] = rotation.quat_xyzw();
        assert_eq!(extraction.record.extrinsics[0].qvec, [w, x, y, z]);
    }

    #[test]
    fn test_intrinsics_and_metadata() {
        let rec = reconstruction(
            camera(CameraModel::Pinhole, vec![500.0, 510.0, 400.0, 300.0]),
            vec![image(1, Rotation::default(), DVec3::X)],
        );
        let record = CameraExtractor::default().extract(&rec).unwrap().record;
        assert_eq!(
            record.intrinsics,
            Intrinsics {
                model: "PINHOLE".into(),
                width: 800,
                height: 600,
                fx: 500.0,
                fy: 510.0,
                cx: 400.0,
                cy: 300.0,
            }
        );
        assert_eq!(record.metadata.num_cameras, 1);
        assert_eq!(record.metadata.num_images, 1);
        assert_eq!(record.metadata.num_points3d, 0);
    }

    #[test]
    fn test_poses_follow_image_id_order() {
        let rec = reconstruction(
            camera(CameraModel::Pinhole, vec![1.0, 1.0, 0.0, 0.0]),
            vec![
                image(9, Rotation::default(), DVec3::ZERO),
                image(2, Rotation::default(), DVec3::ZERO),
                image(5, Rotation::default(), DVec3::ZERO),
            ],
        );
        let record = CameraExtractor::default().extract(&rec).unwrap().record;
        let ids: Vec<u32> = record.extrinsics.iter().map(|p| p.image_id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn test_distorted_model_is_unsupported() {
        let rec = reconstruction(
            camera(CameraModel::SimpleRadial, vec![1.0, 0.5, 0.5, 0.01]),
            vec![image(1, Rotation::default(), DVec3::ZERO)],
        );
        assert!(matches!(
            CameraExtractor::default().extract(&rec),
            Err(InitError::UnsupportedCameraModel { camera_id: 1, params: 4, .. })
        ));
    }

    #[test]
    fn test_wrong_arity_is_unsupported() {
        let rec = reconstruction(
            camera(CameraModel::Pinhole, vec![1.0, 0.5, 0.5]),
            vec![image(1, Rotation::default(), DVec3::ZERO)],
        );
        assert!(matches!(
            CameraExtractor::default().extract(&rec),
            Err(InitError::UnsupportedCameraModel { params: 3, .. })
        ));
    }

    #[test]
    fn test_simple_pinhole_when_enabled() {
        let rec = reconstruction(
            camera(CameraModel::SimplePinhole, vec![700.0, 320.0, 240.0]),
            vec![image(1, Rotation::default(), DVec3::ZERO)],
        );
        assert!(CameraExtractor::default().extract(&rec).is_err());

        let extractor = CameraExtractor::new(CameraConfig {
            supported_models: vec![CameraModel::Pinhole, CameraModel::SimplePinhole],
            ..CameraConfig::default()
        });
        let intrinsics = extractor.extract(&rec).unwrap().record.intrinsics;
        assert_eq!((intrinsics.fx, intrinsics.fy), (700.0, 700.0));
    }

    #[test]
    fn test_empty_reconstruction() {
        let rec = reconstruction(camera(CameraModel::Pinhole, vec![1.0; 4]), vec![]);
        assert!(matches!(
            CameraExtractor::default().extract(&rec),
            Err(InitError::EmptyReconstruction { cameras: 1, images: 0 })
        ));
        assert!(matches!(
            CameraExtractor::default().extract(&Reconstruction::default()),
            Err(InitError::EmptyReconstruction { cameras: 0, .. })
        ));
    }

    #[test]
    fn test_camera_selection_by_id() {
        let mut rec = reconstruction(
            camera(CameraModel::Pinhole, vec![1.0, 1.0, 0.0, 0.0]),
            vec![image(1, Rotation::default(), DVec3::ZERO)],
        );
        rec.cameras.insert(
            7,
            Camera {
                camera_id: 7,
                ..camera(CameraModel::Pinhole, vec![2.0, 2.0, 1.0, 1.0])
            },
        );

        let first = CameraExtractor::default().extract(&rec).unwrap();
        assert_eq!(first.record.intrinsics.fx, 1.0);

        let by_id = CameraExtractor::new(CameraConfig {
            selection: CameraSelection::ById(7),
            ..CameraConfig::default()
        });
        assert_eq!(by_id.extract(&rec).unwrap().record.intrinsics.fx, 2.0);

        let missing = CameraExtractor::new(CameraConfig {
            selection: CameraSelection::ById(3),
            ..CameraConfig::default()
        });
        assert!(matches!(missing.extract(&rec), Err(InitError::Config(_))));
    }

    #[test]
    fn test_mean_translation_norm() {
        let rec = reconstruction(
            camera(CameraModel::Pinhole, vec![1.0; 4]),
            vec![
                image(1, Rotation::default(), DVec3::new(3.0, 4.0, 0.0)),
                image(2, Rotation::default(), DVec3::new(0.0, 0.0, 1.0)),
            ],
        );
        let extraction = CameraExtractor::default().extract(&rec).unwrap();
        assert!((extraction.mean_translation_norm - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_record_json_field_names() {
        let rec = reconstruction(
            camera(CameraModel::Pinhole, vec![1.0; 4]),
            vec![image(1, Rotation::default(), DVec3::ZERO)],
        );
        let record = CameraExtractor::default().extract(&rec).unwrap().record;
        let json = record.to_json().unwrap();
        for key in ["\"R\"", "\"t\"", "\"qvec\"", "\"num_points3D\"", "\"image_name\""] {
            assert!(json.contains(key), "missing {key}");
        }
        assert_eq!(CameraRecord::from_json(&json).unwrap(), record);
    }

    #[test]
    fn test_distorted_model_in_config_is_rejected() {
        let extractor = CameraExtractor::new(CameraConfig {
            supported_models: vec![CameraModel::Opencv],
            ..CameraConfig::default()
        });
        let rec = reconstruction(
            camera(CameraModel::Opencv, vec![1.0; 8]),
            vec![image(1, Rotation::default(), DVec3::ZERO)],
        );
        assert!(matches!(extractor.extract(&rec), Err(InitError::Config(_))));
    }
}
