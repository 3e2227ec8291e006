//! Error types for storage operations

use std::fmt;

use crate::{MetricError, MetricKind};

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Database connection failed
    ConnectionFailed(String),

    /// Database query failed
    QueryFailed(String),

    /// Metric serialization/deserialization error
    SerializationError(String),

    /// I/O error (snapshot file access, etc.)
    IoError(std::io::Error),

    /// No metric with the given name is stored
    NotFound(String),

    /// A write tried to change the kind of an existing metric
    KindMismatch {
        name: String,
        stored: MetricKind,
        incoming: MetricKind,
    },

    /// Accumulating a counter delta would overflow the 64-bit total
    CounterOverflow(String),

    /// A stored or decoded record is not a valid metric
    InvalidMetric(MetricError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to storage backend: {}", msg)
            }
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
            StorageError::SerializationError(msg) => {
                write!(f, "metric serialization error: {}", msg)
            }
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
            StorageError::NotFound(name) => write!(f, "metric not found: {}", name),
            StorageError::KindMismatch {
                name,
                stored,
                incoming,
            } => write!(
                f,
                "metric {} is stored as {} and can not be written as {}",
                name, stored, incoming
            ),
            StorageError::CounterOverflow(name) => {
                write!(f, "counter {} would overflow", name)
            }
            StorageError::InvalidMetric(err) => write!(f, "invalid metric: {}", err),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(err) => Some(err),
            StorageError::InvalidMetric(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<MetricError> for StorageError {
    fn from(err: MetricError) -> Self {
        StorageError::InvalidMetric(err)
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::IoError(io_err),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StorageError::ConnectionFailed(err.to_string())
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}
