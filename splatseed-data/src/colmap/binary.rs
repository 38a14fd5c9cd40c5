//! COLMAP binary model format

use super::ColmapError;
use super::model::{Camera, CameraModel, Image, Point3D, Reconstruction, Rigid3, Rotation};
use byteorder::{LittleEndian, ReadBytesExt};
use glam::DVec3;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

fn open(path: &Path) -> Result<BufReader<File>, ColmapError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ColmapError::io(path, e))
}

/// Read a NUL-terminated string.
fn read_cstring<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut bytes = Vec::new();
    reader.read_until(0, &mut bytes)?;
    if bytes.pop() != Some(0) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "unterminated image name",
        ));
    }
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn read_f64_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[f64; N]> {
    let mut values = [0.0; N];
    reader.read_f64_into::<LittleEndian>(&mut values)?;
    Ok(values)
}

fn read_cameras<R: BufRead>(reader: &mut R, path: &Path) -> Result<Vec<Camera>, ColmapError> {
    let io_err = |e| ColmapError::io(path, e);
    let count = reader.read_u64::<LittleEndian>().map_err(io_err)?;
    let mut cameras = Vec::new();
    for _ in 0..count {
        let camera_id = reader.read_u32::<LittleEndian>().map_err(io_err)?;
        let model_id = reader.read_i32::<LittleEndian>().map_err(io_err)?;
        let model = CameraModel::from_id(model_id)
            .ok_or_else(|| ColmapError::UnknownModel(format!("id {model_id}")))?;
        let width = reader.read_u64::<LittleEndian>().map_err(io_err)?;
        let height = reader.read_u64::<LittleEndian>().map_err(io_err)?;
        let mut params = vec![0.0; model.num_params()];
        reader
            .read_f64_into::<LittleEndian>(&mut params)
            .map_err(io_err)?;
        cameras.push(Camera {
            camera_id,
            model,
            width,
            height,
            params,
        });
    }
    Ok(cameras)
}

fn read_images<R: BufRead>(reader: &mut R, path: &Path) -> Result<Vec<Image>, ColmapError> {
    let io_err = |e| ColmapError::io(path, e);
    let count = reader.read_u64::<LittleEndian>().map_err(io_err)?;
    let mut images = Vec::new();
    for _ in 0..count {
        let image_id = reader.read_u32::<LittleEndian>().map_err(io_err)?;
        let [qw, qx, qy, qz] = read_f64_array::<_, 4>(reader).map_err(io_err)?;
        let [tx, ty, tz] = read_f64_array::<_, 3>(reader).map_err(io_err)?;
        let camera_id = reader.read_u32::<LittleEndian>().map_err(io_err)?;
        let name = read_cstring(reader).map_err(io_err)?;

        // 2D observations: x, y (f64) and point3D id (i64).
        let num_points2d = reader.read_u64::<LittleEndian>().map_err(io_err)?;
        io::copy(&mut reader.by_ref().take(num_points2d * 24), &mut io::sink()).map_err(io_err)?;

        images.push(Image {
            image_id,
            camera_id,
            name,
            cam_from_world: Rigid3::new(
                Rotation::from_wxyz(qw, qx, qy, qz),
                DVec3::new(tx, ty, tz),
            ),
        });
    }
    Ok(images)
}

fn read_points3d<R: BufRead>(reader: &mut R, path: &Path) -> Result<Vec<Point3D>, ColmapError> {
    let io_err = |e| ColmapError::io(path, e);
    let count = reader.read_u64::<LittleEndian>().map_err(io_err)?;
    let mut points = Vec::new();
    for _ in 0..count {
        let point3d_id = reader.read_u64::<LittleEndian>().map_err(io_err)?;
        let [x, y, z] = read_f64_array::<_, 3>(reader).map_err(io_err)?;
        let mut color = [0u8; 3];
        reader.read_exact(&mut color).map_err(io_err)?;
        let error = reader.read_f64::<LittleEndian>().map_err(io_err)?;
        let track_length = reader.read_u64::<LittleEndian>().map_err(io_err)?;
        let mut track = Vec::new();
        for _ in 0..track_length {
            let image_id = reader.read_u32::<LittleEndian>().map_err(io_err)?;
            let point2d_idx = reader.read_u32::<LittleEndian>().map_err(io_err)?;
            track.push((image_id, point2d_idx));
        }
        points.push(Point3D {
            point3d_id,
            xyz: DVec3::new(x, y, z),
            color,
            error,
            track,
        });
    }
    Ok(points)
}

pub(super) fn read_model(dir: &Path) -> Result<Reconstruction, ColmapError> {
    debug!("Reading binary model from {}", dir.display());
    let cameras_path = dir.join("cameras.bin");
    let cameras = read_cameras(&mut open(&cameras_path)?, &cameras_path)?;
    let images_path = dir.join("images.bin");
    let images = read_images(&mut open(&images_path)?, &images_path)?;
    let points_path = dir.join("points3D.bin");
    let points = if points_path.is_file() {
        read_points3d(&mut open(&points_path)?, &points_path)?
    } else {
        Vec::new()
    };

    Ok(Reconstruction {
        cameras: cameras.into_iter().map(|c| (c.camera_id, c)).collect(),
        images: images.into_iter().map(|i| (i.image_id, i)).collect(),
        points3d: points.into_iter().map(|p| (p.point3d_id, p)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::fs;
    use std::io::Write;

    fn cameras_bin() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_u32::<LittleEndian>(3).unwrap();
        buf.write_i32::<LittleEndian>(CameraModel::Pinhole.id()).unwrap();
        buf.write_u64::<LittleEndian>(640).unwrap();
        buf.write_u64::<LittleEndian>(480).unwrap();
        for p in [500.0, 505.0, 320.0, 240.0] {
            buf.write_f64::<LittleEndian>(p).unwrap();
        }
        buf
    }

    fn images_bin() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_u32::<LittleEndian>(9).unwrap();
        for q in [1.0, 0.0, 0.0, 0.0, 0.25, -0.5, 4.0] {
            buf.write_f64::<LittleEndian>(q).unwrap();
        }
        buf.write_u32::<LittleEndian>(3).unwrap();
        buf.write_all(b"img_009.png\0").unwrap();
        buf.write_u64::<LittleEndian>(2).unwrap();
        for _ in 0..2 {
            buf.write_f64::<LittleEndian>(10.0).unwrap();
            buf.write_f64::<LittleEndian>(20.0).unwrap();
            buf.write_i64::<LittleEndian>(-1).unwrap();
        }
        buf
    }

    fn points_bin() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_u64::<LittleEndian>(42).unwrap();
        for c in [1.0, -2.0, 3.0] {
            buf.write_f64::<LittleEndian>(c).unwrap();
        }
        buf.write_all(&[10, 20, 30]).unwrap();
        buf.write_f64::<LittleEndian>(0.75).unwrap();
        buf.write_u64::<LittleEndian>(1).unwrap();
        buf.write_u32::<LittleEndian>(9).unwrap();
        buf.write_u32::<LittleEndian>(1).unwrap();
        buf
    }

    #[test]
    fn test_read_binary_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cameras.bin"), cameras_bin()).unwrap();
        fs::write(dir.path().join("images.bin"), images_bin()).unwrap();
        fs::write(dir.path().join("points3D.bin"), points_bin()).unwrap();

        let model = read_model(dir.path()).unwrap();
        assert_eq!(model.cameras[&3].params, vec![500.0, 505.0, 320.0, 240.0]);
        let image = &model.images[&9];
        assert_eq!(image.name, "img_009.png");
        assert_eq!(image.camera_id, 3);
        assert_eq!(image.cam_from_world.translation, DVec3::new(0.25, -0.5, 4.0));
        assert_eq!(image.cam_from_world.rotation.quat_xyzw(), [0.0, 0.0, 0.0, 1.0]);
        let point = &model.points3d[&42];
        assert_eq!(point.color, [10, 20, 30]);
        assert_eq!(point.track, vec![(9, 1)]);
    }

    #[test]
    fn test_truncated_cameras_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = cameras_bin();
        bytes.truncate(bytes.len() - 4);
        fs::write(dir.path().join("cameras.bin"), bytes).unwrap();
        fs::write(dir.path().join("images.bin"), images_bin()).unwrap();
        assert!(matches!(read_model(dir.path()), Err(ColmapError::Io { .. })));
    }
}
