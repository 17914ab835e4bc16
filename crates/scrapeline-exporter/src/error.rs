//! Exporter-level errors: configuration, I/O and registry failures.

use scrapeline_core::MetricsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExporterError>;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("config: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

impl ExporterError {
    /// Stable code, shared with the core taxonomy where one applies.
    pub fn code(&self) -> &'static str {
        match self {
            ExporterError::Config(_) => "BAD_CONFIG",
            ExporterError::Io(_) => "IO",
            ExporterError::Metrics(e) => e.kind().as_str(),
        }
    }
}
