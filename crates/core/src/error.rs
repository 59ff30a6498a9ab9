//! Error types for the tickbar pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the tickbar pipeline.
///
/// Row-level rejections during cleaning are not errors; they are tallied as
/// [`crate::RejectReason`] values instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed interval string.
    #[error("Invalid interval format: {0}")]
    InvalidIntervalFormat(String),

    /// A timestamp that does not match the expected layout.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// A single input batch could not be read.
    #[error("Batch read error: {0}")]
    BatchRead(String),

    /// Output could not be written.
    #[error("Output write error: {0}")]
    OutputWrite(String),

    /// Nothing to write or aggregate.
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an interval format error.
    pub fn invalid_interval(msg: impl Into<String>) -> Self {
        Error::InvalidIntervalFormat(msg.into())
    }

    /// Create a timestamp parse error.
    pub fn invalid_timestamp(msg: impl Into<String>) -> Self {
        Error::InvalidTimestamp(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a batch read error.
    pub fn batch_read(msg: impl Into<String>) -> Self {
        Error::BatchRead(msg.into())
    }

    /// Create an output write error.
    pub fn output_write(msg: impl Into<String>) -> Self {
        Error::OutputWrite(msg.into())
    }

    /// Create an empty dataset error.
    pub fn empty_dataset(msg: impl Into<String>) -> Self {
        Error::EmptyDataset(msg.into())
    }

    /// Whether this error only affects one batch and the run can go on.
    pub fn is_batch_local(&self) -> bool {
        matches!(self, Error::BatchRead(_))
    }
}
