//! PLY point cloud writing (ASCII)

use crate::fs::write_atomic;
use crate::types::PointCloud;
use std::io::{self, Write};
use std::path::Path;

/// Write a point cloud as an ASCII PLY with double positions and, when the
/// cloud is colored, 8-bit colors.
pub fn write_point_cloud_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    if cloud.has_colors() && cloud.colors.len() != cloud.positions.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{} colors for {} positions",
                cloud.colors.len(),
                cloud.positions.len()
            ),
        ));
    }

    write_atomic(path.as_ref(), |w| {
        writeln!(w, "ply")?;
        writeln!(w, "format ascii 1.0")?;
        writeln!(w, "element vertex {}", cloud.len())?;
        writeln!(w, "property double x")?;
        writeln!(w, "property double y")?;
        writeln!(w, "property double z")?;
        if cloud.has_colors() {
            writeln!(w, "property uchar red")?;
            writeln!(w, "property uchar green")?;
            writeln!(w, "property uchar blue")?;
        }
        writeln!(w, "end_header")?;

        for (i, p) in cloud.positions.iter().enumerate() {
            // `{:?}` keeps the shortest representation that parses back exactly.
            write!(w, "{:?} {:?} {:?}", p.x, p.y, p.z)?;
            if let Some(c) = cloud.colors.get(i) {
                let to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                write!(w, " {} {} {}", to_u8(c.x), to_u8(c.y), to_u8(c.z))?;
            }
            writeln!(w)?;
        }
        Ok(())
    })
}
