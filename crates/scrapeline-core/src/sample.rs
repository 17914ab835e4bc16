//! One time series point: a rendered `l_value` and an atomic `f64`.
//!
//! The value lives in an `AtomicU64` as raw IEEE-754 bits. `add` and `sub`
//! run a compare-and-swap retry loop, so concurrent updates to one sample
//! never block each other and none are lost.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{MetricsError, Result};
use crate::metric::MetricType;

#[derive(Debug)]
pub struct Sample {
    kind: MetricType,
    l_value: String,
    bits: AtomicU64,
}

impl Sample {
    /// Zero-valued sample.
    pub fn new(kind: MetricType, l_value: impl Into<String>) -> Self {
        Self {
            kind,
            l_value: l_value.into(),
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn kind(&self) -> MetricType {
        self.kind
    }

    /// Fully rendered left-hand side, e.g. `requests_total{method="GET"}`.
    pub fn l_value(&self) -> &str {
        &self.l_value
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Add `delta`. Counters and summaries reject negative and NaN deltas.
    pub fn add(&self, delta: f64) -> Result<()> {
        let decreasing = delta.is_nan() || delta < 0.0;
        if matches!(self.kind, MetricType::Counter | MetricType::Summary) && decreasing {
            return Err(MetricsError::InvalidArgument(format!(
                "{} cannot decrease (delta {delta})",
                self.kind
            )));
        }
        self.apply(delta);
        Ok(())
    }

    /// Subtract `delta`; gauges only.
    pub fn sub(&self, delta: f64) -> Result<()> {
        self.require_gauge()?;
        self.apply(-delta);
        Ok(())
    }

    /// Overwrite the value; gauges only.
    pub fn set(&self, value: f64) -> Result<()> {
        self.require_gauge()?;
        self.bits.store(value.to_bits(), Ordering::Release);
        Ok(())
    }

    fn require_gauge(&self) -> Result<()> {
        if self.kind == MetricType::Gauge {
            Ok(())
        } else {
            Err(MetricsError::WrongMetricType {
                expected: MetricType::Gauge.as_str(),
                found: self.kind.as_str(),
            })
        }
    }

    /// Unchecked CAS add.
    pub(crate) fn apply(&self, delta: f64) {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .bits
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counter_rejects_negative_delta() {
        let s = Sample::new(MetricType::Counter, "c");
        s.add(2.5).unwrap();
        let err = s.add(-1.0).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidArgument(_)));
        assert_eq!(s.get(), 2.5);
    }

    #[test]
    fn counter_rejects_nan_delta() {
        let s = Sample::new(MetricType::Counter, "c");
        s.add(5.0).unwrap();
        assert!(matches!(
            s.add(f64::NAN).unwrap_err(),
            MetricsError::InvalidArgument(_)
        ));
        s.add(1.0).unwrap();
        assert_eq!(s.get(), 6.0);

        let summary = Sample::new(MetricType::Summary, "s");
        assert!(summary.add(f64::NAN).is_err());
        assert_eq!(summary.get(), 0.0);
    }

    #[test]
    fn gauge_only_operations() {
        let c = Sample::new(MetricType::Counter, "c");
        assert!(matches!(
            c.set(1.0).unwrap_err(),
            MetricsError::WrongMetricType { expected: "gauge", found: "counter" }
        ));
        assert!(c.sub(1.0).is_err());
        assert_eq!(c.get(), 0.0);

        let g = Sample::new(MetricType::Gauge, "g");
        g.set(5.0).unwrap();
        g.add(-2.0).unwrap();
        g.sub(0.5).unwrap();
        assert_eq!(g.get(), 2.5);
    }

    #[test]
    fn histogram_internals_accept_any_delta() {
        let s = Sample::new(MetricType::Histogram, "h_sum");
        s.add(-3.0).unwrap();
        assert_eq!(s.get(), -3.0);
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        let s = Arc::new(Sample::new(MetricType::Counter, "c"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&s);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        s.add(0.5).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(s.get(), 40_000.0);
    }
}
