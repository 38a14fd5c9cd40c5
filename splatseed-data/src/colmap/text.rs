//! COLMAP text model format

use super::ColmapError;
use super::model::{Camera, CameraModel, Image, Point3D, Reconstruction, Rigid3, Rotation};
use crate::fs::write_atomic;
use glam::DVec3;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};
use tracing::debug;

/// Numbered lines of a model file, with comments removed.
fn read_lines(path: &Path) -> Result<Vec<(usize, String)>, ColmapError> {
    let content = fs::read_to_string(path).map_err(|e| ColmapError::io(path, e))?;
    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim_start().starts_with('#'))
        .map(|(i, line)| (i + 1, line.trim().to_string()))
        .collect())
}

/// Whitespace token cursor that reports the offending line on failure.
struct Fields<'a> {
    path: &'a Path,
    line: usize,
    tokens: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(path: &'a Path, line: usize, text: &'a str) -> Self {
        Self {
            path,
            line,
            tokens: text.split_whitespace(),
        }
    }

    fn next<T: FromStr>(&mut self, what: &str) -> Result<T, ColmapError> {
        let token = self
            .tokens
            .next()
            .ok_or_else(|| ColmapError::parse(self.path, self.line, format!("missing {what}")))?;
        token.parse().map_err(|_| {
            ColmapError::parse(self.path, self.line, format!("invalid {what} '{token}'"))
        })
    }

    fn rest(self) -> Vec<&'a str> {
        self.tokens.collect()
    }
}

fn read_cameras(path: &Path) -> Result<Vec<Camera>, ColmapError> {
    let mut cameras = Vec::new();
    for (line, text) in read_lines(path)? {
        if text.is_empty() {
            continue;
        }
        let mut fields = Fields::new(path, line, &text);
        let camera_id = fields.next("camera id")?;
        let model_name: String = fields.next("camera model")?;
        let model = CameraModel::from_str(&model_name)?;
        let width = fields.next("width")?;
        let height = fields.next("height")?;
        let params = fields
            .rest()
            .into_iter()
            .map(|t| {
                t.parse::<f64>().map_err(|_| {
                    ColmapError::parse(path, line, format!("invalid camera parameter '{t}'"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
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

fn read_images(path: &Path) -> Result<Vec<Image>, ColmapError> {
    let lines = read_lines(path)?;
    let mut images = Vec::new();
    let mut iter = lines.iter();

    // Each image spans two lines; the second (2D observations) may be empty.
    while let Some((line, text)) = iter.next() {
        if text.is_empty() {
            continue;
        }
        let mut fields = Fields::new(path, *line, text);
        let image_id = fields.next("image id")?;
        let qw = fields.next("qw")?;
        let qx = fields.next("qx")?;
        let qy = fields.next("qy")?;
        let qz = fields.next("qz")?;
        let tx = fields.next("tx")?;
        let ty = fields.next("ty")?;
        let tz = fields.next("tz")?;
        let camera_id = fields.next("camera id")?;
        let name = fields.rest().join(" ");
        if name.is_empty() {
            return Err(ColmapError::parse(path, *line, "missing image name"));
        }
        iter.next();

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

fn read_points3d(path: &Path) -> Result<Vec<Point3D>, ColmapError> {
    let mut points = Vec::new();
    for (line, text) in read_lines(path)? {
        if text.is_empty() {
            continue;
        }
        let mut fields = Fields::new(path, line, &text);
        let point3d_id = fields.next("point id")?;
        let xyz = DVec3::new(fields.next("x")?, fields.next("y")?, fields.next("z")?);
        let color = [fields.next("r")?, fields.next("g")?, fields.next("b")?];
        let error = fields.next("error")?;
        let rest = fields.rest();
        if rest.len() % 2 != 0 {
            return Err(ColmapError::parse(path, line, "odd number of track entries"));
        }
        let track = rest
            .chunks(2)
            .map(|pair| match (pair[0].parse::<u32>(), pair[1].parse::<u32>()) {
                (Ok(image_id), Ok(point2d_idx)) => Ok((image_id, point2d_idx)),
                _ => Err(ColmapError::parse(path, line, "invalid track entry")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        points.push(Point3D {
            point3d_id,
            xyz,
            color,
            error,
            track,
        });
    }
    Ok(points)
}

pub(super) fn read_model(dir: &Path) -> Result<Reconstruction, ColmapError> {
    debug!("Reading text model from {}", dir.display());
    let cameras = read_cameras(&dir.join("cameras.txt"))?;
    let images = read_images(&dir.join("images.txt"))?;
    let points_path = dir.join("points3D.txt");
    let points = if points_path.is_file() {
        read_points3d(&points_path)?
    } else {
        Vec::new()
    };

    Ok(Reconstruction {
        cameras: cameras.into_iter().map(|c| (c.camera_id, c)).collect(),
        images: images.into_iter().map(|i| (i.image_id, i)).collect(),
        points3d: points.into_iter().map(|p| (p.point3d_id, p)).collect(),
    })
}

pub(super) fn write_model(model: &Reconstruction, dir: &Path) -> Result<(), ColmapError> {
    let cameras_path = dir.join("cameras.txt");
    write_atomic(&cameras_path, |w| {
        writeln!(w, "# Camera list with one line of data per camera:")?;
        writeln!(w, "#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]")?;
        for camera in model.cameras.values() {
            write!(
                w,
                "{} {} {} {}",
                camera.camera_id, camera.model, camera.width, camera.height
            )?;
            for p in &camera.params {
                write!(w, " {p:?}")?;
            }
            writeln!(w)?;
        }
        Ok(())
    })
    .map_err(|e| ColmapError::io(&cameras_path, e))?;

    let images_path = dir.join("images.txt");
    write_atomic(&images_path, |w| {
        writeln!(w, "# Image list with two lines of data per image:")?;
        writeln!(w, "#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME")?;
        writeln!(w, "#   POINTS2D[] as (X, Y, POINT3D_ID)")?;
        for image in model.images.values() {
            let [qx, qy, qz, qw] = image.cam_from_world.rotation.quat_xyzw();
            let t = image.cam_from_world.translation;
            writeln!(
                w,
                "{} {qw:?} {qx:?} {qy:?} {qz:?} {:?} {:?} {:?} {} {}",
                image.image_id, t.x, t.y, t.z, image.camera_id, image.name
            )?;
            writeln!(w)?;
        }
        Ok(())
    })
    .map_err(|e| ColmapError::io(&images_path, e))?;

    let points_path = dir.join("points3D.txt");
    write_atomic(&points_path, |w| {
        writeln!(w, "# 3D point list with one line of data per point:")?;
        writeln!(w, "#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)")?;
        for point in model.points3d.values() {
            write!(
                w,
                "{} {:?} {:?} {:?} {} {} {} {:?}",
                point.point3d_id,
                point.xyz.x,
                point.xyz.y,
                point.xyz.z,
                point.color[0],
                point.color[1],
                point.color[2],
                point.error
            )?;
            for (image_id, idx) in &point.track {
                write!(w, " {image_id} {idx}")?;
            }
            writeln!(w)?;
        }
        Ok(())
    })
    .map_err(|e| ColmapError::io(&points_path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMERAS: &str = "# Camera list with one line of data per camera:
#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]
# Number of cameras: 1
1 PINHOLE 1920 1080 1500.5 1510.25 960 540
";

    const IMAGES: &str = "# Image list with two lines of data per image:
2 1 0 0 0 0.5 -1 2 1 frame_0002.jpg

1 0.7071067811865476 0 0.7071067811865476 0 1 2 3 1 frame 0001.jpg
100.5 200.5 -1 10 20 4
";

    const POINTS: &str = "# 3D point list
4 1.5 2.5 3.5 255 128 0 0.25 1 0 2 1
";

    fn write_fixture(dir: &Path) {
        fs::write(dir.join("cameras.txt"), CAMERAS).unwrap();
        fs::write(dir.join("images.txt"), IMAGES).unwrap();
        fs::write(dir.join("points3D.txt"), POINTS).unwrap();
    }

    #[test]
    fn test_read_text_model() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let model = read_model(dir.path()).unwrap();

        let camera = &model.cameras[&1];
        assert_eq!(camera.model, CameraModel::Pinhole);
        assert_eq!((camera.width, camera.height), (1920, 1080));
        assert_eq!(camera.params, vec![1500.5, 1510.25, 960.0, 540.0]);

        assert_eq!(model.images.len(), 2);
        let ids: Vec<u32> = model.images.keys().copied().collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(model.images[&1].name, "frame 0001.jpg");
        assert_eq!(model.images[&2].cam_from_world.translation, DVec3::new(0.5, -1.0, 2.0));

        let point = &model.points3d[&4];
        assert_eq!(point.color, [255, 128, 0]);
        assert_eq!(point.track, vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn test_text_model_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let model = read_model(dir.path()).unwrap();

        let out = tempfile::tempdir().unwrap();
        write_model(&model, out.path()).unwrap();
        let reread = read_model(out.path()).unwrap();
        assert_eq!(reread.cameras, model.cameras);
        assert_eq!(reread.points3d, model.points3d);
        for (id, image) in &model.images {
            let other = &reread.images[id];
            assert_eq!(other.name, image.name);
            assert_eq!(other.cam_from_world.translation, image.cam_from_world.translation);
            let q0 = image.cam_from_world.rotation.quat();
            let q1 = other.cam_from_world.rotation.quat();
            assert!(q0.abs_diff_eq(q1, 1e-12));
        }
    }

    #[test]
    fn test_bad_camera_line_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(dir.path().join("cameras.txt"), "1 PINHOLE wide 1080 1 1 1 1\n").unwrap();
        let err = read_model(dir.path()).unwrap_err();
        match err {
            ColmapError::Parse { line, message, .. } => {
                assert_eq!(line, 1);
                assert!(message.contains("width"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(dir.path().join("cameras.txt"), "1 KANNALA 10 10 1 1 1 1\n").unwrap();
        assert!(matches!(
            read_model(dir.path()),
            Err(ColmapError::UnknownModel(_))
        ));
    }
}
