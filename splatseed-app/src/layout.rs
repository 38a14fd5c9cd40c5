//! Default file locations inside a project root.

use std::path::PathBuf;

/// Resolves artifact paths relative to a project root:
/// `sparse/0/` holds the reconstruction and `outputs/` the artifacts.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn model(&self) -> PathBuf {
        self.root.join("sparse").join("0")
    }

    pub fn points(&self) -> PathBuf {
        self.model().join("points3D.ply")
    }

    pub fn outputs(&self) -> PathBuf {
        self.root.join("outputs")
    }

    pub fn scales(&self) -> PathBuf {
        self.outputs().join("scales.splatarc")
    }

    pub fn params(&self) -> PathBuf {
        self.outputs().join("gaussian_params.splatarc")
    }

    pub fn summary(&self) -> PathBuf {
        self.outputs().join("stats.txt")
    }

    pub fn cameras(&self) -> PathBuf {
        self.outputs().join("cameras.json")
    }

    pub fn report(&self) -> PathBuf {
        self.outputs().join("analysis").join("report.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_locations() {
        let layout = ProjectLayout::new("/data/scene");
        assert_eq!(layout.points(), Path::new("/data/scene/sparse/0/points3D.ply"));
        assert_eq!(layout.model(), Path::new("/data/scene/sparse/0"));
        assert_eq!(layout.scales(), Path::new("/data/scene/outputs/scales.splatarc"));
        assert_eq!(layout.params(), Path::new("/data/scene/outputs/gaussian_params.splatarc"));
        assert_eq!(layout.summary(), Path::new("/data/scene/outputs/stats.txt"));
        assert_eq!(layout.cameras(), Path::new("/data/scene/outputs/cameras.json"));
        assert_eq!(layout.report(), Path::new("/data/scene/outputs/analysis/report.txt"));
    }
}
