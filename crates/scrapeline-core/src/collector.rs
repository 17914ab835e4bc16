//! Named group of metrics plus a hook run at scrape time.

use std::sync::Arc;

use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::map::ConcurrentMap;
use crate::metric::Metric;

/// Metric name -> metric.
pub type MetricMap = ConcurrentMap<Arc<Metric>>;

/// Scrape-time refresh step. Returns the map to render.
pub trait CollectHook: Send + Sync {
    fn collect<'a>(&self, metrics: &'a MetricMap) -> Result<&'a MetricMap>;
}

/// Hands the map back untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl CollectHook for PassThrough {
    fn collect<'a>(&self, metrics: &'a MetricMap) -> Result<&'a MetricMap> {
        Ok(metrics)
    }
}

pub struct Collector {
    name: String,
    metrics: MetricMap,
    hook: Box<dyn CollectHook>,
}

impl Collector {
    pub fn new(name: &str) -> Self {
        Self::with_hook(name, PassThrough)
    }

    pub fn with_hook<H: CollectHook + 'static>(name: &str, hook: H) -> Self {
        Self {
            name: name.to_string(),
            metrics: MetricMap::new(),
            hook: Box::new(hook),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a metric; a taken name is `AlreadyExists` and leaves the
    /// registered metric in place.
    pub fn add_metric(&self, metric: Arc<Metric>) -> Result<()> {
        let mut inserted = false;
        self.metrics.get_or_insert_with(metric.name(), || {
            inserted = true;
            Ok(Arc::clone(&metric))
        })?;
        if !inserted {
            return Err(MetricsError::AlreadyExists(format!(
                "metric {} in collector {}",
                metric.name(),
                self.name
            )));
        }
        debug!(collector = %self.name, metric = %metric.name(), "metric registered");
        Ok(())
    }

    pub fn get_metric(&self, name: &str) -> Result<Option<Arc<Metric>>> {
        self.metrics.get(name)
    }

    pub fn remove_metric(&self, name: &str) -> Result<()> {
        if self.metrics.delete(name)? {
            debug!(collector = %self.name, metric = %name, "metric unregistered");
            Ok(())
        } else {
            Err(MetricsError::NotFound(format!(
                "metric {name} in collector {}",
                self.name
            )))
        }
    }

    pub fn metric_count(&self) -> Result<usize> {
        self.metrics.size()
    }

    /// Run the hook and snapshot what it returns, in key order.
    pub fn collect(&self) -> Result<Vec<Arc<Metric>>> {
        let metrics = self.hook.collect(&self.metrics)?;
        Ok(metrics.entries()?.into_iter().map(|(_, m)| m).collect())
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("name", &self.name)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
