use std::sync::Arc;

use crate::error::Result;
use crate::metric::{Metric, MetricType};

/// Monotonic counter handle. Cloning shares the underlying metric.
#[derive(Debug, Clone)]
pub struct Counter {
    metric: Arc<Metric>,
}

impl Counter {
    pub fn new(name: &str, help: &str, label_keys: &[&str]) -> Result<Self> {
        Ok(Self {
            metric: Arc::new(Metric::new(MetricType::Counter, name, help, label_keys)?),
        })
    }

    /// Wrap an existing metric; fails unless it is a counter.
    pub fn from_metric(metric: Arc<Metric>) -> Result<Self> {
        metric.require_kind(MetricType::Counter)?;
        Ok(Self { metric })
    }

    pub fn metric(&self) -> &Arc<Metric> {
        &self.metric
    }

    pub fn inc(&self, label_values: &[&str]) -> Result<()> {
        self.add(1.0, label_values)
    }

    /// Fails on a negative `delta`.
    pub fn add(&self, delta: f64, label_values: &[&str]) -> Result<()> {
        self.metric.sample_for(label_values)?.add(delta)
    }

    /// Current value; `NotFound` if the series was never written.
    pub fn value(&self, label_values: &[&str]) -> Result<f64> {
        Ok(self.metric.find_sample(label_values)?.get())
    }
}
