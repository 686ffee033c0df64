//! Errors raised while registering, looking up, or reading instruments.

use http::StatusCode;
use thiserror::Error;

/// Result alias for instrument operations.
pub type InstrumentResult<T> = Result<T, InstrumentError>;

/// Errors produced by instruments and the snapshot query interface.
#[derive(Debug, Error)]
pub enum InstrumentError {
    /// Requested instrument is not part of the registered set.
    #[error("unknown instrument `{name}`")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// Instrument name collided with an existing registration.
    #[error("instrument `{name}` is already registered")]
    DuplicateInstrument {
        /// Name of the offending instrument.
        name: String,
    },

    /// An instrument failed to read its internal state.
    #[error("instrument `{instrument}` failed to measure: {reason}")]
    Measurement {
        /// Name of the failing instrument.
        instrument: String,
        /// Human-readable failure description.
        reason: String,
    },
}

impl InstrumentError {
    /// Creates a measurement failure for the named instrument.
    #[must_use]
    pub fn measurement(instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Measurement {
            instrument: instrument.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not-found error for the supplied name.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Returns `true` for lookups of unregistered instruments.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status an endpoint should answer with for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::DuplicateInstrument { .. } => StatusCode::CONFLICT,
            Self::Measurement { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            InstrumentError::not_found("nonexistent").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            InstrumentError::measurement("queues", "store vanished").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(InstrumentError::not_found("x").is_not_found());
        assert!(!InstrumentError::measurement("x", "y").is_not_found());
    }
}
