//! Configuration errors.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON for the expected schema.
    #[error("failed to parse configuration file: {source}")]
    Parse {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },
    /// A setting carried a value that could not be interpreted.
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        /// Environment variable or file key.
        key: String,
        /// Offending raw value.
        value: String,
        /// What was expected instead.
        reason: &'static str,
    },
    /// The assembled configuration violates a constraint.
    #[error("invalid observability configuration: {0}")]
    Invalid(&'static str),
}

impl ConfigError {
    pub(crate) fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason,
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
