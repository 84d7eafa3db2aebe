//! Error types for the admission loader
//!
//! Messages are user-facing: the binary prints them verbatim before exiting
//! with a non-zero status.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal loader errors.
///
/// Per-value parse failures are not errors; they surface as
/// [`ParseWarning`](crate::normalize::ParseWarning)s and the value becomes absent.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Required columns are missing from the header row
    #[error("Schema error: missing required columns: {}. Check the CSV header row.", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Source file does not exist
    #[error("Input file not found: '{}'. Verify the --csv path.", .0.display())]
    InputNotFound(PathBuf),

    /// CSV could not be read or decoded
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// Destination unreachable, unauthorized, or the command itself was refused
    #[error("Destination error: {0}. Check the MongoDB URI, credentials and that the server is reachable.")]
    Connectivity(String),

    /// Some operations of a batch were rejected; the others were applied
    #[error("Batch {batch}: {failed} write operation(s) rejected, first error: {message}")]
    WriteRejected {
        batch: usize,
        failed: usize,
        message: String,
    },

    /// A document could not be encoded to BSON
    #[error("Failed to encode document: {0}")]
    Encoding(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run stopped by a cancellation request before all batches were applied
    #[error("Migration cancelled after {completed} of {total} batches; applied batches remain committed")]
    Cancelled { completed: usize, total: usize },
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }
}

impl From<mongodb::bson::ser::Error> for IngestError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<mongodb::error::Error> for IngestError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Connectivity(err.to_string())
    }
}
