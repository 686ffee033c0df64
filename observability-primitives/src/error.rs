//! Shared error definitions for observability primitives.

use thiserror::Error;

/// Result alias used throughout the observability crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// A session id or trace file name did not parse.
    #[error("invalid session id `{value}`")]
    InvalidSessionId {
        /// Offending input.
        value: String,
    },

    /// A record could not be built from the supplied value.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
