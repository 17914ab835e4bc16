//! scrapeline exporter library entry.
//!
//! Serves a scrapeline registry over HTTP: strict YAML config, a procfs
//! source for the process collector, operational routes and self-metrics.
//! Consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod error;
pub mod obs;
pub mod ops;
pub mod procfs;
pub mod router;

pub use error::{ExporterError, Result};
