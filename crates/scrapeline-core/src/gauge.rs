use std::sync::Arc;

use crate::error::Result;
use crate::metric::{Metric, MetricType};

/// Gauge handle: a value that moves both ways.
#[derive(Debug, Clone)]
pub struct Gauge {
    metric: Arc<Metric>,
}

impl Gauge {
    pub fn new(name: &str, help: &str, label_keys: &[&str]) -> Result<Self> {
        Ok(Self {
            metric: Arc::new(Metric::new(MetricType::Gauge, name, help, label_keys)?),
        })
    }

    pub fn from_metric(metric: Arc<Metric>) -> Result<Self> {
        metric.require_kind(MetricType::Gauge)?;
        Ok(Self { metric })
    }

    pub fn metric(&self) -> &Arc<Metric> {
        &self.metric
    }

    pub fn inc(&self, label_values: &[&str]) -> Result<()> {
        self.add(1.0, label_values)
    }

    pub fn dec(&self, label_values: &[&str]) -> Result<()> {
        self.sub(1.0, label_values)
    }

    pub fn add(&self, delta: f64, label_values: &[&str]) -> Result<()> {
        self.metric.sample_for(label_values)?.add(delta)
    }

    pub fn sub(&self, delta: f64, label_values: &[&str]) -> Result<()> {
        self.metric.sample_for(label_values)?.sub(delta)
    }

    pub fn set(&self, value: f64, label_values: &[&str]) -> Result<()> {
        self.metric.sample_for(label_values)?.set(value)
    }

    /// Current value; `NotFound` if the series was never written.
    pub fn value(&self, label_values: &[&str]) -> Result<f64> {
        Ok(self.metric.find_sample(label_values)?.get())
    }
}
