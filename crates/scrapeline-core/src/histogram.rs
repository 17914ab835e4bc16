use std::sync::Arc;

use crate::buckets::HistogramBuckets;
use crate::error::Result;
use crate::histogram_sample::HistogramSample;
use crate::metric::{Metric, MetricType};

/// Histogram handle with cumulative buckets.
#[derive(Debug, Clone)]
pub struct Histogram {
    metric: Arc<Metric>,
}

impl Histogram {
    /// Histogram on the default bucket layout.
    pub fn new(name: &str, help: &str, label_keys: &[&str]) -> Result<Self> {
        Self::with_buckets(name, help, label_keys, HistogramBuckets::default())
    }

    pub fn with_buckets(
        name: &str,
        help: &str,
        label_keys: &[&str],
        buckets: HistogramBuckets,
    ) -> Result<Self> {
        Ok(Self {
            metric: Arc::new(Metric::histogram(name, help, label_keys, buckets)?),
        })
    }

    pub fn from_metric(metric: Arc<Metric>) -> Result<Self> {
        metric.require_kind(MetricType::Histogram)?;
        Ok(Self { metric })
    }

    pub fn metric(&self) -> &Arc<Metric> {
        &self.metric
    }

    pub fn observe(&self, value: f64, label_values: &[&str]) -> Result<()> {
        self.metric.histogram_sample_for(label_values)?.observe(value)
    }

    /// Bucket state for one label set.
    pub fn sample(&self, label_values: &[&str]) -> Result<Arc<HistogramSample>> {
        self.metric.histogram_sample_for(label_values)
    }
}
