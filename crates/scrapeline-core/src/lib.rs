//! scrapeline core: in-process metrics registry and text exposition.
//!
//! Application threads update typed, labeled metrics; a scraper asks the
//! [`Registry`] for a text snapshot. Layers, leaf first:
//! - [`buffer`], [`list`], [`map`]: text buffer, ordered list and the locked
//!   hash map every directory in the crate is built on
//! - [`sample`], [`histogram_sample`]: CAS-updated values and cumulative
//!   bucket accounting
//! - [`metric`] plus the [`Counter`], [`Gauge`] and [`Histogram`] handles
//! - [`collector`], [`registry`], [`formatter`]: grouping and rendering
//!
//! This crate carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Allocation growth
//! and poisoned locks surface as [`MetricsError`] values.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod buckets;
pub mod buffer;
pub mod collector;
pub mod counter;
pub mod error;
pub mod formatter;
pub mod gauge;
pub mod histogram;
pub mod histogram_sample;
pub mod list;
pub mod map;
pub mod metric;
pub mod process;
pub mod registry;
pub mod sample;

pub use buckets::HistogramBuckets;
pub use collector::{CollectHook, Collector, MetricMap, PassThrough};
pub use counter::Counter;
/// Shared result type.
pub use error::{ErrorKind, MetricsError, Result};
pub use formatter::Formatter;
pub use gauge::Gauge;
pub use histogram::Histogram;
pub use histogram_sample::HistogramSample;
pub use metric::{Metric, MetricType, SampleSlot};
pub use process::{process_collector, ProcessSnapshot, ProcessSource};
pub use registry::{Registry, RegistryHandle, RegistryState};
pub use sample::Sample;
