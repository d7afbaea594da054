use thiserror::Error;

use crate::storage::ObjectLocation;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failure talking to the object store.
///
/// Always fatal to a run: it propagates out of the pipeline without any output or metrics.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist.
    #[error("object not found: {location}")]
    NotFound { location: ObjectLocation },

    /// The caller may not read or write the object.
    #[error("access denied: {location}")]
    AccessDenied { location: ObjectLocation },

    /// Underlying I/O failure against the backing store.
    #[error("storage i/o error at {location}: {source}")]
    Io {
        location: ObjectLocation,
        #[source]
        source: std::io::Error,
    },
}

/// The input's column structure cannot satisfy the expected schema.
///
/// Unlike row-level invalidity this means the file cannot be partitioned at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema mismatch: missing required column(s) {missing:?}; columns={available:?}")]
pub struct SchemaError {
    /// Required columns absent from the input, in declaration order.
    pub missing: Vec<String>,
    /// Columns the input actually has, after normalization.
    pub available: Vec<String>,
}

/// Error type returned by the pipeline and its adapters.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Download/upload/existence-check failure.
    #[error("transport error: {0}")]
    Transport(#[from] StorageError),

    /// CSV reader or writer failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The payload is not a well-formed table (bad encoding, ragged rows, ...).
    #[error("failed to parse input at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// The trigger event does not name an object.
    #[error("invalid trigger event: {message}")]
    Event { message: String },

    /// The pipeline configuration is unusable.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}
