//! Exporter self-metrics, registered in the default collector next to the
//! application's own metrics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scrapeline_core::{Counter, Gauge, Histogram, HistogramBuckets, Registry, Result};

/// Scrape duration buckets, in seconds.
const SCRAPE_BUCKETS: [f64; 8] = [0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0];

/// Outcome label of `scrapeline_scrapes_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Ok,
    Error,
}

impl ScrapeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeOutcome::Ok => "ok",
            ScrapeOutcome::Error => "error",
        }
    }
}

pub struct ExporterMetrics {
    pub scrapes: Counter,
    pub scrape_duration: Histogram,
    pub draining_gauge: Gauge,
    draining: AtomicBool,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            scrapes: Counter::new(
                "scrapeline_scrapes_total",
                "Scrapes served, by outcome.",
                &["outcome"],
            )?,
            scrape_duration: Histogram::with_buckets(
                "scrapeline_scrape_duration_seconds",
                "Time spent rendering a scrape.",
                &[],
                HistogramBuckets::new(SCRAPE_BUCKETS.to_vec())?,
            )?,
            draining_gauge: Gauge::new(
                "scrapeline_draining",
                "1 while the exporter is shutting down.",
                &[],
            )?,
            draining: AtomicBool::new(false),
        })
    }

    /// Register all self-metrics into the registry's default collector.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register_metric(Arc::clone(self.scrapes.metric()))?;
        registry.register_metric(Arc::clone(self.scrape_duration.metric()))?;
        registry.register_metric(Arc::clone(self.draining_gauge.metric()))?;
        self.draining_gauge.set(0.0, &[])
    }

    pub fn observe_scrape(&self, outcome: ScrapeOutcome, elapsed: Duration) -> Result<()> {
        self.scrapes.inc(&[outcome.as_str()])?;
        self.scrape_duration.observe(elapsed.as_secs_f64(), &[])
    }

    /// Mark draining state.
    pub fn set_draining(&self) -> Result<()> {
        self.draining.store(true, Ordering::Relaxed);
        self.draining_gauge.set(1.0, &[])
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }
}
