//! Error types for the tracing subsystem.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted while preparing, writing, or reading trace files.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Underlying I/O failure while touching or appending to a trace file.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// An event could not be encoded as JSON.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// The event kind name is not one the tracer knows.
    #[error("unknown event kind `{0}`")]
    UnknownEventKind(String),
}

/// Result type alias for tracing operations.
pub type TraceResult<T> = Result<T, TraceError>;
