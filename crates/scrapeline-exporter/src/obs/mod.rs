//! Exporter observability.
//!
//! The exporter reports on itself through the same registry it serves:
//! scrape counts and latency plus a draining flag.

pub mod metrics;

pub use metrics::{ExporterMetrics, ScrapeOutcome};
