//! Error types for the vector stores

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error reported by a database driver, passed through untouched.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Error types that can occur in store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Query type \"{kind}\" is not supported by store \"{store}\"")]
    UnsupportedQuery { kind: String, store: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Snapshot checksum mismatch: {}", path.display())]
    CorruptSnapshot { path: PathBuf },

    #[error("Database driver error: {0}")]
    Driver(#[source] DriverError),
}

impl StoreError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_configuration(msg: impl Into<String>) -> Self {
        StoreError::InvalidConfiguration(msg.into())
    }
}
