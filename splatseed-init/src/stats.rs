//! Descriptive statistics over scalar samples.

use std::fmt;

/// Min, max, mean, median and population standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
}

impl Summary {
    /// Summarize `values`; `None` for an empty sample.
    ///
    /// The median of an even-sized sample is the mean of the two middle values.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            std: variance.sqrt(),
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Min:    {:.6}", self.min)?;
        writeln!(f, "  Max:    {:.6}", self.max)?;
        writeln!(f, "  Mean:   {:.6}", self.mean)?;
        writeln!(f, "  Median: {:.6}", self.median)?;
        write!(f, "  Std:    {:.6}", self.std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_odd() {
        let s = Summary::of([3.0, 1.0, 2.0]).unwrap();
        assert_eq!(s.count, 3);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.median, 2.0);
        assert!((s.std - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_summary_even_median() {
        let s = Summary::of([4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.median, 2.5);
    }

    #[test]
    fn test_summary_empty() {
        assert!(Summary::of(std::iter::empty()).is_none());
    }
}
