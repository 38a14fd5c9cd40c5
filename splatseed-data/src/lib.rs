//! Splatseed Data Crate
//!
//! Readers and writers for the artifacts a Gaussian Splatting initialization
//! consumes and produces: PLY point clouds, COLMAP sparse models and compressed
//! named-array archives. This crate holds no numerical policy of its own.

pub mod archive;
pub mod colmap;
pub mod fs;
pub mod ply;
pub mod types;

pub use archive::{ArchiveError, ArrayArchive, ArrayData, NamedArray};
pub use colmap::{Camera, CameraModel, ColmapError, Image, Point3D, Reconstruction, Rigid3, Rotation};
pub use fs::write_atomic;
pub use ply::{PlyError, read_point_cloud_ply, write_point_cloud_ply};
pub use types::PointCloud;
