//! PLY point cloud reading and writing

mod loader;
mod writer;

pub use loader::{PlyError, read_point_cloud_ply};
pub use writer::write_point_cloud_ply;
