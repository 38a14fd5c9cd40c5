//! PLY point cloud loading

use crate::types::PointCloud;
use glam::DVec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while reading a PLY file.
#[derive(Debug, Error)]
pub enum PlyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PLY parsing error: {0}")]
    Parse(String),
    #[error("missing '{property}' at vertex {index}")]
    MissingProperty { property: &'static str, index: usize },
}

// Face structure for PLY files
#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct PlyFace {
    vertex_indices: Vec<i32>,
}

// PLY file structure
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<HashMap<String, JsonValue>>,
    #[serde(default, rename = "face")]
    face: Vec<PlyFace>,
}

/// A present coordinate that is not a JSON number was NaN or infinite in
/// the file (`serde_json::Value` stores those as `Null`); it reads as NaN so
/// callers can reject it as non-finite.
fn get_coordinate(prop: Option<&JsonValue>) -> Option<f64> {
    prop.and_then(|v| match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Null => Some(f64::NAN),
        _ => None,
    })
}

/// Integer channels are 8-bit and get normalized by 255, float channels are
/// taken as already normalized.
fn get_channel(prop: Option<&JsonValue>) -> Option<f64> {
    prop.and_then(|v| match v {
        JsonValue::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u as f64 / 255.0)
            } else if let Some(i) = n.as_i64() {
                Some(i as f64 / 255.0)
            } else {
                n.as_f64()
            }
        }
        _ => None,
    })
}

fn get_color(vertex: &HashMap<String, JsonValue>) -> Option<DVec3> {
    for [r, g, b] in [["red", "green", "blue"], ["r", "g", "b"]] {
        if let (Some(r), Some(g), Some(b)) = (
            get_channel(vertex.get(r)),
            get_channel(vertex.get(g)),
            get_channel(vertex.get(b)),
        ) {
            return Some(DVec3::new(r, g, b));
        }
    }
    None
}

/// Read point positions and colors from a PLY file.
///
/// Positions come from `x`/`y`/`z` (float or double). Colors come from
/// `red`/`green`/`blue` or `r`/`g`/`b`. When any vertex lacks color the whole
/// cloud is returned uncolored.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_point_cloud_ply(path: impl AsRef<Path>) -> Result<PointCloud, PlyError> {
    debug!("Loading PLY point cloud");
    let file = File::open(path.as_ref())?;
    read_point_cloud_ply_from(BufReader::new(file))
}

pub(crate) fn read_point_cloud_ply_from<R: BufRead>(reader: R) -> Result<PointCloud, PlyError> {
    let ply_data: PlyFile = serde_ply::from_reader(reader).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        PlyError::Parse(e.to_string())
    })?;

    info!(
        "PLY file parsed: {} vertices, {} faces",
        ply_data.vertex.len(),
        ply_data.face.len()
    );

    let mut positions = Vec::with_capacity(ply_data.vertex.len());
    let mut colors = Vec::with_capacity(ply_data.vertex.len());
    let mut colored = true;

    for (index, vertex) in ply_data.vertex.iter().enumerate() {
        let coord = |property: &'static str| {
            get_coordinate(vertex.get(property)).ok_or(PlyError::MissingProperty { property, index })
        };
        positions.push(DVec3::new(coord("x")?, coord("y")?, coord("z")?));

        if colored {
            match get_color(vertex) {
                Some(color) => colors.push(color),
                None => colored = false,
            }
        }
    }

    if !colored {
        if !colors.is_empty() {
            warn!(
                "Only {} of {} vertices carry color, ignoring colors",
                colors.len(),
                positions.len()
            );
        }
        colors.clear();
    }

    debug!(
        "Loaded {} points ({})",
        positions.len(),
        if colored { "colored" } else { "uncolored" }
    );
    Ok(PointCloud::new(positions, colors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const COLORED: &str = "ply
format ascii 1.0
element vertex 2
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
end_header
0 0 0 255 0 0
1 2 3 0 51 255
";

    const UNCOLORED: &str = "ply
format ascii 1.0
element vertex 3
property double x
property double y
property double z
end_header
0.5 0 0
0 1.5 0
0 0 -2.5
";

    #[test]
    fn test_read_colored_ascii_ply() {
        let cloud = read_point_cloud_ply_from(Cursor::new(COLORED)).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.positions[1], DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(cloud.colors[0], DVec3::new(1.0, 0.0, 0.0));
        assert!((cloud.colors[1].y - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_read_uncolored_ascii_ply() {
        let cloud = read_point_cloud_ply_from(Cursor::new(UNCOLORED)).unwrap();
        assert_eq!(cloud.len(), 3);
        assert!(!cloud.has_colors());
        assert_eq!(cloud.positions[2], DVec3::new(0.0, 0.0, -2.5));
    }

    #[test]
    fn test_non_finite_coordinates_read_as_nan() {
        let ply = "ply
format ascii 1.0
element vertex 3
property float x
property float y
property float z
end_header
0 0 0
nan 1 2
3 inf 4
";
        let cloud = read_point_cloud_ply_from(Cursor::new(ply)).unwrap();
        assert_eq!(cloud.len(), 3);
        assert!(cloud.positions[1].x.is_nan());
        assert!(!cloud.positions[2].is_finite());
        assert_eq!(cloud.positions[0], DVec3::ZERO);
    }

    #[test]
    fn test_missing_coordinate_is_reported() {
        let ply = "ply
format ascii 1.0
element vertex 1
property float x
property float y
end_header
1 2
";
        let err = read_point_cloud_ply_from(Cursor::new(ply)).unwrap_err();
        assert!(matches!(
            err,
            PlyError::MissingProperty {
                property: "z",
                index: 0
            }
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_point_cloud_ply("/definitely/not/here.ply").unwrap_err();
        assert!(matches!(err, PlyError::Io(_)));
    }
}
