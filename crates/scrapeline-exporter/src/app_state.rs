//! Shared application state for the exporter.
//!
//! Owns the registry handle for the process lifetime: init on construction,
//! teardown on shutdown.

use std::sync::Arc;
use std::time::Instant;

use scrapeline_core::RegistryHandle;

use crate::config::ExporterConfig;
use crate::error::Result;
use crate::obs::{ExporterMetrics, ScrapeOutcome};
use crate::procfs::ProcfsSource;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ExporterConfig,
    registry: RegistryHandle,
    metrics: ExporterMetrics,
}

impl AppState {
    /// Initialize the registry and wire the process collector and
    /// self-metrics. Errors are returned, never panicked on.
    pub fn new(cfg: ExporterConfig) -> Result<Self> {
        let registry = RegistryHandle::new(&cfg.exporter.registry_name);
        let live = registry.default_init()?;

        if cfg.exporter.process_metrics {
            registry.enable_process_metrics(ProcfsSource::from_config(&cfg.process))?;
        }

        let metrics = ExporterMetrics::new()?;
        metrics.register(&live)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.inner.cfg
    }

    /// Handle for application code registering its own metrics.
    pub fn registry(&self) -> &RegistryHandle {
        &self.inner.registry
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.inner.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    pub fn set_draining(&self) {
        if let Err(e) = self.inner.metrics.set_draining() {
            tracing::warn!(error = %e, "failed to update draining gauge");
        }
    }

    /// Render one scrape and record its outcome.
    pub fn render(&self) -> scrapeline_core::Result<String> {
        let started = Instant::now();
        let res = self.inner.registry.render();
        let outcome = if res.is_ok() {
            ScrapeOutcome::Ok
        } else {
            ScrapeOutcome::Error
        };
        if let Err(e) = self.inner.metrics.observe_scrape(outcome, started.elapsed()) {
            tracing::warn!(error = %e, "failed to record scrape");
        }
        res
    }

    /// Tear the registry down; later scrapes fail until re-init.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.registry.teardown()?;
        Ok(())
    }
}
