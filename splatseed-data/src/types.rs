//! Core CPU-side data types shared by the readers.

use glam::DVec3;

/// An ordered set of points with optional per-point RGB colors.
///
/// `colors` is either empty (the source carried no color) or exactly as long
/// as `positions`. Colors are linear RGB in the 0-1 range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub positions: Vec<DVec3>,
    pub colors: Vec<DVec3>,
}

impl PointCloud {
    /// Create a cloud with positions and matching colors.
    pub fn new(positions: Vec<DVec3>, colors: Vec<DVec3>) -> Self {
        Self { positions, colors }
    }

    /// Create a cloud without color information.
    pub fn uncolored(positions: Vec<DVec3>) -> Self {
        Self {
            positions,
            colors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    /// Colors if present, `None` when the cloud is uncolored.
    pub fn colors(&self) -> Option<&[DVec3]> {
        if self.colors.is_empty() {
            None
        } else {
            Some(&self.colors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncolored_cloud_reports_no_colors() {
        let cloud = PointCloud::uncolored(vec![DVec3::ZERO, DVec3::X]);
        assert_eq!(cloud.len(), 2);
        assert!(!cloud.has_colors());
        assert!(cloud.colors().is_none());
    }

    #[test]
    fn test_colored_cloud() {
        let cloud = PointCloud::new(vec![DVec3::ONE], vec![DVec3::splat(0.25)]);
        assert!(cloud.has_colors());
        assert_eq!(cloud.colors().map(|c| c.len()), Some(1));
    }
}
