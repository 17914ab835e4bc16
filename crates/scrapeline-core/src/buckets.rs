//! Histogram upper bounds, shared by every label set of one histogram.

use tracing::warn;

use crate::error::{MetricsError, Result};

/// Bounds used when a histogram is created without explicit buckets.
pub const DEFAULT_BOUNDS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Non-empty, non-decreasing list of finite-or-infinite bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBuckets {
    bounds: Vec<f64>,
}

impl HistogramBuckets {
    /// Validate and wrap explicit bounds. Equal neighbours are allowed.
    pub fn new(bounds: impl Into<Vec<f64>>) -> Result<Self> {
        let bounds = bounds.into();
        if bounds.is_empty() {
            return Err(invalid("histogram needs at least one bucket"));
        }
        if bounds.iter().any(|b| b.is_nan()) {
            return Err(invalid("histogram bucket bound is NaN"));
        }
        if let Some(w) = bounds.windows(2).find(|w| w[1] < w[0]) {
            return Err(invalid(&format!(
                "histogram buckets must be non-decreasing ({} after {})",
                w[1], w[0]
            )));
        }
        Ok(Self { bounds })
    }

    /// `count` buckets starting at `start`, each `width` apart.
    pub fn linear(start: f64, width: f64, count: usize) -> Result<Self> {
        if count <= 1 {
            return Err(invalid("linear buckets need count > 1"));
        }
        Self::new((0..count).map(|i| start + width * i as f64).collect::<Vec<_>>())
    }

    /// `count` buckets starting at `start`, each `factor` times the previous.
    pub fn exponential(start: f64, factor: f64, count: usize) -> Result<Self> {
        if count < 1 {
            return Err(invalid("exponential buckets need count >= 1"));
        }
        if start <= 0.0 {
            return Err(invalid("exponential buckets need start > 0"));
        }
        if factor <= 1.0 {
            return Err(invalid("exponential buckets need factor > 1"));
        }
        let mut bounds = Vec::with_capacity(count);
        let mut bound = start;
        for _ in 0..count {
            bounds.push(bound);
            bound *= factor;
        }
        Self::new(bounds)
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

impl Default for HistogramBuckets {
    fn default() -> Self {
        Self {
            bounds: DEFAULT_BOUNDS.to_vec(),
        }
    }
}

fn invalid(msg: &str) -> MetricsError {
    warn!(reason = %msg, "rejected histogram buckets");
    MetricsError::InvalidArgument(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_rules() {
        assert!(HistogramBuckets::new(vec![5.0, 1.0]).is_err());
        assert!(HistogramBuckets::new(vec![1.0, 1.0, 5.0]).is_ok());
        assert!(HistogramBuckets::new(Vec::new()).is_err());
        assert!(HistogramBuckets::new(vec![1.0, f64::NAN]).is_err());
        assert!(HistogramBuckets::new(vec![1.0, f64::INFINITY]).is_ok());
    }

    #[test]
    fn linear_layout() {
        let b = HistogramBuckets::linear(1.0, 2.0, 4).unwrap();
        assert_eq!(b.bounds(), &[1.0, 3.0, 5.0, 7.0]);
        assert!(HistogramBuckets::linear(1.0, 2.0, 1).is_err());
        // negative width produces a decreasing layout
        assert!(HistogramBuckets::linear(1.0, -1.0, 3).is_err());
    }

    #[test]
    fn exponential_layout() {
        let b = HistogramBuckets::exponential(1.0, 2.0, 5).unwrap();
        assert_eq!(b.bounds(), &[1.0, 2.0, 4.0, 8.0, 16.0]);
        assert_eq!(HistogramBuckets::exponential(3.0, 2.0, 1).unwrap().len(), 1);
        assert!(HistogramBuckets::exponential(1.0, 2.0, 0).is_err());
        assert!(HistogramBuckets::exponential(0.0, 2.0, 3).is_err());
        assert!(HistogramBuckets::exponential(1.0, 1.0, 3).is_err());
    }

    #[test]
    fn default_layout() {
        let b = HistogramBuckets::default();
        assert_eq!(b.len(), 11);
        assert_eq!(b.bounds()[0], 0.005);
        assert_eq!(b.bounds()[10], 10.0);
    }
}
