//! Shared error type across scrapeline crates.

use thiserror::Error;

/// Stable error codes (the exposition layer and exporter report these).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: wrong metric type, reserved label, unsorted buckets.
    InvalidArgument,
    /// Missing collector, metric or sample.
    NotFound,
    /// Duplicate metric or collector registration.
    AlreadyExists,
    /// Buffer, node or table growth failed.
    AllocFailed,
    /// A lock was poisoned by a panicking holder.
    LockFailed,
    /// A collect hook could not refresh its metrics.
    CollectFailed,
}

impl ErrorKind {
    /// String representation used in logs and HTTP error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::AllocFailed => "ALLOC_FAILED",
            ErrorKind::LockFailed => "LOCK_FAILED",
            ErrorKind::CollectFailed => "COLLECT_FAILED",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by the core and the exporter.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("wrong metric type: expected {expected}, found {found}")]
    WrongMetricType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("allocation failed: {0}")]
    Alloc(String),
    #[error("lock failure: {0}")]
    Lock(String),
    #[error("collect failed: {0}")]
    Collect(String),
}

impl MetricsError {
    /// Map an error to its stable code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MetricsError::WrongMetricType { .. } => ErrorKind::InvalidArgument,
            MetricsError::NotFound(_) => ErrorKind::NotFound,
            MetricsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            MetricsError::Alloc(_) => ErrorKind::AllocFailed,
            MetricsError::Lock(_) => ErrorKind::LockFailed,
            MetricsError::Collect(_) => ErrorKind::CollectFailed,
        }
    }

    /// Lock failure helper; logs once at the point the poison is observed.
    pub(crate) fn poisoned(what: &str) -> Self {
        tracing::error!(lock = %what, "lock poisoned");
        MetricsError::Lock(format!("{what} lock poisoned"))
    }
}
