//! Error types for tablewal
//!
//! Provides a unified error type for all WAL operations.

use thiserror::Error;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // Append-time Errors
    // -------------------------------------------------------------------------
    /// An entry violates a static size bound. Never retried, never queued.
    #[error("Validation error: {0}")]
    Validation(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// A single physical object store call failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt allowed by `retry_count` failed for one object.
    #[error("Persistence failure on {key} after {attempts} attempt(s): {source}")]
    Persistence {
        key: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("WAL writer is closed")]
    Closed,
}

impl From<bincode::Error> for WalError {
    fn from(err: bincode::Error) -> Self {
        WalError::Serialization(err.to_string())
    }
}

impl WalError {
    /// True for the error kinds produced by an exhausted retry budget
    pub fn is_persistence(&self) -> bool {
        matches!(self, WalError::Persistence { .. })
    }
}
