//! Process log initialisation.

use observability_config::{LogFormat, ObservabilityConfig};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";
const DEBUG_FILTER: &str = "info,platform_observability=debug,observability_instruments=debug,\
                            observability_tracing=debug,observability_kernel=debug,\
                            observability_config=debug";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `info` or `observability_tracing=trace`.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_owned(),
        }
    }
}

impl LogConfig {
    /// Derives the log setup from the observability configuration.
    ///
    /// The debug switch raises every crate of this workspace to `debug`.
    #[must_use]
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        let filter = if config.debug() {
            DEBUG_FILTER
        } else {
            DEFAULT_FILTER
        };
        Self {
            format: config.log_format(),
            filter: filter.to_owned(),
        }
    }
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LogError {
    /// The filter directives did not parse.
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),
    /// Another global subscriber is already installed.
    #[error("subscriber already initialized")]
    AlreadyInitialized,
}

/// Installs the global `tracing` subscriber.
///
/// Call once at startup.
///
/// # Errors
///
/// Returns [`LogError::InvalidFilter`] for malformed directives and
/// [`LogError::AlreadyInitialized`] when a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|e| LogError::InvalidFilter(e.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };
    installed.map_err(|_| LogError::AlreadyInitialized)
}
