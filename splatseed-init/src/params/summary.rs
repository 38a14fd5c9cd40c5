//! Human-readable statistics of a parameter set.

use super::{GaussianParams, IDENTITY_ROTATION};
use crate::stats::Summary;
use std::fmt;

/// Per-field statistics of a [`GaussianParams`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParamsSummary {
    pub count: usize,
    /// Per axis (x, y, z).
    pub positions: [Summary; 3],
    pub scales: Summary,
    pub opacities: Summary,
    /// Per channel (r, g, b).
    pub colors: [Summary; 3],
    pub identity_rotations: usize,
}

fn column<const W: usize>(rows: &[[f32; W]], c: usize) -> Summary {
    Summary::of(rows.iter().map(|r| r[c] as f64)).unwrap_or(EMPTY)
}

fn scalars(values: &[f32]) -> Summary {
    Summary::of(values.iter().map(|&v| v as f64)).unwrap_or(EMPTY)
}

const EMPTY: Summary = Summary {
    count: 0,
    min: f64::NAN,
    max: f64::NAN,
    mean: f64::NAN,
    median: f64::NAN,
    std: f64::NAN,
};

impl ParamsSummary {
    pub fn of(params: &GaussianParams) -> Self {
        Self {
            count: params.len(),
            positions: [0, 1, 2].map(|c| column(params.means(), c)),
            scales: scalars(params.scales()),
            opacities: scalars(params.opacities()),
            colors: [0, 1, 2].map(|c| column(params.colors(), c)),
            identity_rotations: params
                .rotations()
                .iter()
                .filter(|&&q| q == IDENTITY_ROTATION)
                .count(),
        }
    }

    /// Mean position.
    pub fn centroid(&self) -> [f64; 3] {
        self.positions.map(|s| s.mean)
    }
}

impl fmt::Display for ParamsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Gaussian Parameters Summary")?;
        writeln!(f, "===========================")?;
        writeln!(f)?;
        writeln!(f, "Total Gaussians: {}", self.count)?;
        writeln!(f)?;

        writeln!(f, "Positions:")?;
        for (axis, s) in ["X", "Y", "Z"].iter().zip(&self.positions) {
            writeln!(
                f,
                "  {axis} range: [{:.3}, {:.3}]  mean: {:.3}  median: {:.3}",
                s.min, s.max, s.mean, s.median
            )?;
        }
        let [cx, cy, cz] = self.centroid();
        writeln!(f, "  Center: [{cx:.3}, {cy:.3}, {cz:.3}]")?;
        writeln!(f)?;

        writeln!(f, "Scales:")?;
        writeln!(f, "  Range: [{:.6}, {:.6}]", self.scales.min, self.scales.max)?;
        writeln!(f, "  Mean: {:.6}", self.scales.mean)?;
        writeln!(f, "  Median: {:.6}", self.scales.median)?;
        writeln!(f)?;

        writeln!(f, "Opacities:")?;
        writeln!(f, "  Range: [{:.3}, {:.3}]", self.opacities.min, self.opacities.max)?;
        writeln!(f, "  Mean: {:.3}", self.opacities.mean)?;
        writeln!(f, "  Median: {:.3}", self.opacities.median)?;
        writeln!(f)?;

        writeln!(f, "Rotations:")?;
        writeln!(f, "  Identity: {} of {}", self.identity_rotations, self.count)?;
        writeln!(f)?;

        let [r, g, b] = &self.colors;
        writeln!(f, "Colors (RGB):")?;
        writeln!(f, "  Mean: [{:.3}, {:.3}, {:.3}]", r.mean, g.mean, b.mean)?;
        writeln!(f, "  Median: [{:.3}, {:.3}, {:.3}]", r.median, g.median, b.median)?;
        write!(
            f,
            "  Range: R [{:.3}, {:.3}]  G [{:.3}, {:.3}]  B [{:.3}, {:.3}]",
            r.min, r.max, g.min, g.max, b.min, b.max
        )
    }
}
