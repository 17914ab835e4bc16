//! The "process" collector: six OS-derived gauges refreshed on every scrape.
//!
//! Values come from a [`ProcessSource`]. The core never touches `/proc`
//! itself; the exporter ships a procfs-backed source.

use tracing::debug;

use crate::collector::{CollectHook, Collector, MetricMap};
use crate::error::{MetricsError, Result};
use crate::gauge::Gauge;

/// Name the process collector registers under.
pub const PROCESS_COLLECTOR: &str = "process";

/// One reading of process figures.
///
/// Limit and fd figures are always present. Stat-derived figures are `None`
/// when the stat file could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSnapshot {
    /// Soft "Max open files" limit; -1 when unlimited.
    pub max_fds: f64,
    /// Soft "Max address space" limit; -1 when unlimited.
    pub virtual_memory_max_bytes: f64,
    pub open_fds: f64,
    pub cpu_seconds_total: Option<f64>,
    pub virtual_memory_bytes: Option<f64>,
    pub start_time_seconds: Option<f64>,
}

pub trait ProcessSource: Send + Sync {
    fn snapshot(&self) -> Result<ProcessSnapshot>;
}

impl<F> ProcessSource for F
where
    F: Fn() -> Result<ProcessSnapshot> + Send + Sync,
{
    fn snapshot(&self) -> Result<ProcessSnapshot> {
        self()
    }
}

struct ProcessGauges {
    max_fds: Gauge,
    virtual_memory_max_bytes: Gauge,
    cpu_seconds_total: Gauge,
    virtual_memory_bytes: Gauge,
    start_time_seconds: Gauge,
    open_fds: Gauge,
}

impl ProcessGauges {
    fn new() -> Result<Self> {
        Ok(Self {
            max_fds: Gauge::new(
                "process_max_fds",
                "Maximum number of open file descriptors.",
                &[],
            )?,
            virtual_memory_max_bytes: Gauge::new(
                "process_virtual_memory_max_bytes",
                "Maximum amount of virtual memory available in bytes.",
                &[],
            )?,
            cpu_seconds_total: Gauge::new(
                "process_cpu_seconds_total",
                "Total user and system CPU time spent in seconds.",
                &[],
            )?,
            virtual_memory_bytes: Gauge::new(
                "process_virtual_memory_bytes",
                "Virtual memory size in bytes.",
                &[],
            )?,
            start_time_seconds: Gauge::new(
                "process_start_time_seconds",
                "Start time of the process since unix epoch in seconds.",
                &[],
            )?,
            open_fds: Gauge::new("process_open_fds", "Number of open file descriptors.", &[])?,
        })
    }

    fn all(&self) -> [&Gauge; 6] {
        [
            &self.max_fds,
            &self.virtual_memory_max_bytes,
            &self.cpu_seconds_total,
            &self.virtual_memory_bytes,
            &self.start_time_seconds,
            &self.open_fds,
        ]
    }

    fn apply(&self, snap: &ProcessSnapshot) -> Result<()> {
        self.max_fds.set(snap.max_fds, &[])?;
        self.virtual_memory_max_bytes
            .set(snap.virtual_memory_max_bytes, &[])?;
        self.open_fds.set(snap.open_fds, &[])?;

        let stat = [
            (&self.cpu_seconds_total, snap.cpu_seconds_total),
            (&self.virtual_memory_bytes, snap.virtual_memory_bytes),
            (&self.start_time_seconds, snap.start_time_seconds),
        ];
        for (gauge, value) in stat {
            match value {
                Some(v) => gauge.set(v, &[])?,
                None => debug!(metric = %gauge.metric().name(), "stat figure unavailable"),
            }
        }
        Ok(())
    }
}

/// Collect hook that refreshes the process gauges from `S`.
pub struct ProcessCollect<S> {
    source: S,
    gauges: ProcessGauges,
}

impl<S: ProcessSource> CollectHook for ProcessCollect<S> {
    fn collect<'a>(&self, metrics: &'a MetricMap) -> Result<&'a MetricMap> {
        let snap = self.source.snapshot().map_err(|e| match e {
            MetricsError::Collect(_) => e,
            other => MetricsError::Collect(other.to_string()),
        })?;
        self.gauges.apply(&snap)?;
        Ok(metrics)
    }
}

/// Build the "process" collector with its six gauges registered.
pub fn process_collector<S: ProcessSource + 'static>(source: S) -> Result<Collector> {
    let gauges = ProcessGauges::new()?;
    let metrics: Vec<_> = gauges.all().iter().map(|g| g.metric().clone()).collect();
    let collector = Collector::with_hook(PROCESS_COLLECTOR, ProcessCollect { source, gauges });
    for metric in metrics {
        collector.add_metric(metric)?;
    }
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Result<ProcessSnapshot> {
        Ok(ProcessSnapshot {
            max_fds: 1024.0,
            virtual_memory_max_bytes: -1.0,
            open_fds: 7.0,
            cpu_seconds_total: Some(0.42),
            virtual_memory_bytes: Some(4096.0),
            start_time_seconds: Some(1_700_000_000.5),
        })
    }

    fn value(c: &Collector, name: &str) -> f64 {
        let metric = c.get_metric(name).unwrap().unwrap();
        metric.sample_for(&[]).unwrap().get()
    }

    #[test]
    fn collect_refreshes_all_gauges() {
        let c = process_collector(full).unwrap();
        assert_eq!(c.name(), "process");
        let names: Vec<String> = c
            .collect()
            .unwrap()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "process_max_fds",
                "process_virtual_memory_max_bytes",
                "process_cpu_seconds_total",
                "process_virtual_memory_bytes",
                "process_start_time_seconds",
                "process_open_fds",
            ]
        );
        assert_eq!(value(&c, "process_max_fds"), 1024.0);
        assert_eq!(value(&c, "process_virtual_memory_max_bytes"), -1.0);
        assert_eq!(value(&c, "process_cpu_seconds_total"), 0.42);
        assert_eq!(value(&c, "process_open_fds"), 7.0);
    }

    #[test]
    fn missing_stat_leaves_stat_gauges_alone() {
        let c = process_collector(|| -> Result<ProcessSnapshot> {
            Ok(ProcessSnapshot {
                max_fds: 256.0,
                open_fds: 3.0,
                ..ProcessSnapshot::default()
            })
        })
        .unwrap();
        c.collect().unwrap();
        assert_eq!(value(&c, "process_max_fds"), 256.0);
        assert_eq!(value(&c, "process_virtual_memory_bytes"), 0.0);
    }

    #[test]
    fn source_failure_is_a_collect_error() {
        let c = process_collector(|| -> Result<ProcessSnapshot> {
            Err(MetricsError::NotFound("/proc/self/limits".into()))
        })
        .unwrap();
        assert!(matches!(c.collect().unwrap_err(), MetricsError::Collect(_)));
    }
}
