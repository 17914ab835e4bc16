//! Registry of collectors and the explicit lifecycle handle around it.
//!
//! Locking is two-level. The registry's own `RwLock` guards the collector
//! directory; each collector and metric guards its own contents. The
//! registry lock is never taken while holding a metric lock.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, info};

use crate::collector::Collector;
use crate::error::{MetricsError, Result};
use crate::formatter::Formatter;
use crate::map::ConcurrentMap;
use crate::metric::Metric;
use crate::process::{process_collector, ProcessSource};

/// Name of the collector every registry starts with.
pub const DEFAULT_COLLECTOR: &str = "default";

#[derive(Debug)]
pub struct Registry {
    name: String,
    collectors: ConcurrentMap<Arc<Collector>>,
    lock: RwLock<()>,
    formatter: Mutex<Formatter>,
}

impl Registry {
    /// Registry seeded with an empty "default" collector.
    pub fn new(name: &str) -> Result<Self> {
        let collectors = ConcurrentMap::new();
        collectors.set(DEFAULT_COLLECTOR, Arc::new(Collector::new(DEFAULT_COLLECTOR)))?;
        Ok(Self {
            name: name.to_string(),
            collectors,
            lock: RwLock::new(()),
            formatter: Mutex::new(Formatter::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register_collector(&self, collector: Arc<Collector>) -> Result<()> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| MetricsError::poisoned("registry"))?;
        let mut inserted = false;
        self.collectors.get_or_insert_with(collector.name(), || {
            inserted = true;
            Ok(Arc::clone(&collector))
        })?;
        if !inserted {
            return Err(MetricsError::AlreadyExists(format!(
                "collector {} in registry {}",
                collector.name(),
                self.name
            )));
        }
        debug!(registry = %self.name, collector = %collector.name(), "collector registered");
        Ok(())
    }

    pub fn unregister_collector(&self, name: &str) -> Result<()> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| MetricsError::poisoned("registry"))?;
        if !self.collectors.delete(name)? {
            return Err(MetricsError::NotFound(format!("collector {name}")));
        }
        debug!(registry = %self.name, collector = %name, "collector unregistered");
        Ok(())
    }

    pub fn get_collector(&self, name: &str) -> Result<Option<Arc<Collector>>> {
        let _guard = self
            .lock
            .read()
            .map_err(|_| MetricsError::poisoned("registry"))?;
        self.collectors.get(name)
    }

    /// Register into the "default" collector.
    pub fn register_metric(&self, metric: Arc<Metric>) -> Result<()> {
        let collector = self
            .get_collector(DEFAULT_COLLECTOR)?
            .ok_or_else(|| MetricsError::NotFound(format!("collector {DEFAULT_COLLECTOR}")))?;
        collector.add_metric(metric)
    }

    /// Collector names in key order.
    pub fn collector_names(&self) -> Result<Vec<String>> {
        let _guard = self
            .lock
            .read()
            .map_err(|_| MetricsError::poisoned("registry"))?;
        Ok(self
            .collectors
            .keys()?
            .iter()
            .map(|k| k.to_string())
            .collect())
    }

    /// Render every collector's metrics as one freshly owned exposition text.
    ///
    /// Values are read as each line is written; concurrent updates land
    /// sample by sample. On error nothing partial is returned and the
    /// formatter is left empty.
    pub fn render(&self) -> Result<String> {
        let collectors: Vec<Arc<Collector>> = {
            let _guard = self
                .lock
                .read()
                .map_err(|_| MetricsError::poisoned("registry"))?;
            self.collectors
                .entries()?
                .into_iter()
                .map(|(_, c)| c)
                .collect()
        };

        let mut formatter = self
            .formatter
            .lock()
            .map_err(|_| MetricsError::poisoned("registry formatter"))?;
        match formatter.load_collectors(&collectors) {
            Ok(()) => Ok(formatter.dump()),
            Err(e) => {
                formatter.clear();
                Err(e)
            }
        }
    }
}

/// Where a [`RegistryHandle`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    DefaultInitialized,
    ProcessMetricsEnabled,
    Serving,
    Destroyed,
}

#[derive(Debug)]
struct HandleInner {
    state: RegistryState,
    registry: Option<Arc<Registry>>,
}

/// Explicit owner of the application registry.
///
/// Created once at startup and passed to whoever needs it. `default_init`
/// is idempotent, including under concurrent callers.
#[derive(Debug)]
pub struct RegistryHandle {
    name: String,
    inner: Mutex<HandleInner>,
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTOR)
    }
}

impl RegistryHandle {
    /// Uninitialized handle; `name` is used for the registry it creates.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(HandleInner {
                state: RegistryState::Uninitialized,
                registry: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandleInner>> {
        self.inner
            .lock()
            .map_err(|_| MetricsError::poisoned("registry handle"))
    }

    pub fn state(&self) -> Result<RegistryState> {
        Ok(self.lock()?.state)
    }

    /// Create the registry if there is none. Later calls return the same one.
    pub fn default_init(&self) -> Result<Arc<Registry>> {
        let mut inner = self.lock()?;
        if let Some(registry) = &inner.registry {
            return Ok(Arc::clone(registry));
        }
        let registry = Arc::new(Registry::new(&self.name)?);
        inner.registry = Some(Arc::clone(&registry));
        inner.state = RegistryState::DefaultInitialized;
        info!(registry = %self.name, "registry initialized");
        Ok(registry)
    }

    /// The live registry; `NotFound` before init or after teardown.
    pub fn registry(&self) -> Result<Arc<Registry>> {
        self.lock()?
            .registry
            .clone()
            .ok_or_else(|| MetricsError::NotFound(format!("registry {}", self.name)))
    }

    /// Register the "process" collector fed by `source`.
    pub fn enable_process_metrics<S: ProcessSource + 'static>(&self, source: S) -> Result<()> {
        let mut inner = self.lock()?;
        let registry = inner
            .registry
            .clone()
            .ok_or_else(|| MetricsError::NotFound(format!("registry {}", self.name)))?;
        registry.register_collector(Arc::new(process_collector(source)?))?;
        if inner.state == RegistryState::DefaultInitialized {
            inner.state = RegistryState::ProcessMetricsEnabled;
        }
        info!(registry = %self.name, "process metrics enabled");
        Ok(())
    }

    /// Register into the default collector of the live registry.
    pub fn register_metric(&self, metric: Arc<Metric>) -> Result<()> {
        self.registry()?.register_metric(metric)
    }

    /// Render the live registry and mark the handle as serving.
    pub fn render(&self) -> Result<String> {
        let registry = {
            let mut inner = self.lock()?;
            let registry = inner
                .registry
                .clone()
                .ok_or_else(|| MetricsError::NotFound(format!("registry {}", self.name)))?;
            inner.state = RegistryState::Serving;
            registry
        };
        registry.render()
    }

    /// Drop the registry. A later `default_init` starts from scratch.
    pub fn teardown(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.registry = None;
        inner.state = RegistryState::Destroyed;
        info!(registry = %self.name, "registry destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;
    use crate::process::ProcessSnapshot;

    #[test]
    fn registry_starts_with_default_collector() {
        let r = Registry::new("app").unwrap();
        assert_eq!(r.collector_names().unwrap(), ["default"]);
        assert_eq!(r.render().unwrap(), "");
    }

    #[test]
    fn duplicate_collector_rejected() {
        let r = Registry::new("app").unwrap();
        r.register_collector(Arc::new(Collector::new("jobs"))).unwrap();
        assert!(matches!(
            r.register_collector(Arc::new(Collector::new("jobs")))
                .unwrap_err(),
            MetricsError::AlreadyExists(_)
        ));
        r.unregister_collector("jobs").unwrap();
        assert!(r.unregister_collector("jobs").is_err());
    }

    #[test]
    fn register_metric_needs_default_collector() {
        let r = Registry::new("app").unwrap();
        r.unregister_collector(DEFAULT_COLLECTOR).unwrap();
        let c = Counter::new("c_total", "h", &[]).unwrap();
        assert!(matches!(
            r.register_metric(Arc::clone(c.metric())).unwrap_err(),
            MetricsError::NotFound(_)
        ));
    }

    #[test]
    fn handle_lifecycle() {
        let h = RegistryHandle::new("app");
        assert_eq!(h.state().unwrap(), RegistryState::Uninitialized);
        let c = Counter::new("c_total", "h", &[]).unwrap();
        assert!(matches!(
            h.register_metric(Arc::clone(c.metric())).unwrap_err(),
            MetricsError::NotFound(_)
        ));

        let first = h.default_init().unwrap();
        let again = h.default_init().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(h.state().unwrap(), RegistryState::DefaultInitialized);

        h.enable_process_metrics(|| -> Result<ProcessSnapshot> { Ok(ProcessSnapshot::default()) })
            .unwrap();
        assert_eq!(h.state().unwrap(), RegistryState::ProcessMetricsEnabled);

        h.register_metric(Arc::clone(c.metric())).unwrap();
        c.inc(&[]).unwrap();
        let text = h.render().unwrap();
        assert!(text.starts_with("# HELP c_total h\n# TYPE c_total counter\nc_total 1.000000\n\n"));
        assert!(text.contains("process_open_fds 0.000000\n"));
        assert_eq!(h.state().unwrap(), RegistryState::Serving);

        h.teardown().unwrap();
        assert_eq!(h.state().unwrap(), RegistryState::Destroyed);
        assert!(h.render().is_err());

        let fresh = h.default_init().unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(fresh.render().unwrap(), "");
    }

    #[test]
    fn concurrent_default_init_yields_one_registry() {
        let h = Arc::new(RegistryHandle::new("app"));
        let registries: Vec<Arc<Registry>> = (0..8)
            .map(|_| {
                let h = Arc::clone(&h);
                std::thread::spawn(move || h.default_init().unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();
        for r in &registries[1..] {
            assert!(Arc::ptr_eq(&registries[0], r));
        }
    }
}
