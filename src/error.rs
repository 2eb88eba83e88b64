//! Error types for lux-uploader

use thiserror::Error;

/// Result type for lux-uploader operations
pub type Result<T> = std::result::Result<T, UploadError>;

/// Error taxonomy for the upload pipeline.
///
/// Per-record errors are converted to failure outcomes at the worker
/// boundary; only `Auth` during startup token acquisition aborts the run.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Source URI does not parse to a LUX identifier (terminal, local)
    #[error("invalid LUX URI format: {0}")]
    InvalidFormat(String),

    /// Network or transport-level failure (retryable, bounded attempts)
    #[error("network error: {0}")]
    Transport(String),

    /// Edit token could not be acquired (fatal to the run)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Server refused the write (terminal, no retry)
    #[error("server rejected claim: {0}")]
    Rejected(String),

    /// Retry budget exhausted without a created claim
    #[error("max retries exceeded after {0} attempts")]
    MaxRetriesExceeded(u32),

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
