//! Strongly typed configuration schema.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use observability_primitives::SessionId;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// `service.operation` pairs counted individually by default.
pub const DEFAULT_REQUEST_FILTER: [&str; 8] = [
    "sqs.SendMessage",
    "sqs.ReceiveMessage",
    "sns.Publish",
    "dynamodb.PutItem",
    "dynamodb.GetItem",
    "dynamodb.BatchWriteItem",
    "dynamodb.BatchGetItem",
    "lambda.Invoke",
];

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const CACHE_DIR_NAME: &str = "platform-observability";

/// Output format of the process log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    #[default]
    Compact,
}

impl LogFormat {
    /// Name used in configuration values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            _ => Err(ConfigError::invalid_value(
                "log_format",
                s,
                "expected one of json, pretty, compact",
            )),
        }
    }
}

/// Settings of the observability layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub(crate) debug: bool,
    pub(crate) cache_root: PathBuf,
    pub(crate) flush_interval: Duration,
    pub(crate) metrics_log_interval: Option<Duration>,
    pub(crate) request_filter: Vec<String>,
    pub(crate) log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            debug: false,
            cache_root: default_cache_root(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            metrics_log_interval: None,
            request_filter: DEFAULT_REQUEST_FILTER.map(str::to_owned).to_vec(),
            log_format: LogFormat::default(),
        }
    }
}

impl ObservabilityConfig {
    /// Returns `true` when debug logging is enabled.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Directory under which trace files are written.
    #[must_use]
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Period at which trace loggers are flushed.
    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Period of the metrics snapshot log, if enabled.
    #[must_use]
    pub const fn metrics_log_interval(&self) -> Option<Duration> {
        self.metrics_log_interval
    }

    /// `service.operation` pairs counted individually.
    #[must_use]
    pub fn request_filter(&self) -> &[String] {
        &self.request_filter
    }

    /// Output format of the process log.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Enables or disables debug logging.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Overrides the trace file directory.
    #[must_use]
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    /// Overrides the flush period.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Enables the periodic metrics snapshot log.
    #[must_use]
    pub fn with_metrics_log_interval(mut self, interval: Option<Duration>) -> Self {
        self.metrics_log_interval = interval;
        self
    }

    /// Replaces the request allow-list.
    #[must_use]
    pub fn with_request_filter<I, S>(mut self, filter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_filter = filter.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the log format.
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Path of the trace file for `subsystem` in `session`.
    #[must_use]
    pub fn trace_file(&self, subsystem: &str, session: SessionId) -> PathBuf {
        self.cache_root
            .join(subsystem)
            .join(session.trace_file_name())
    }

    /// Checks the configuration for values the runtime cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero intervals and
    /// [`ConfigError::InvalidValue`] for malformed request filter entries.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid("flush interval must be greater than zero"));
        }
        if self.metrics_log_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::Invalid(
                "metrics log interval must be greater than zero",
            ));
        }
        for entry in &self.request_filter {
            let well_formed = entry
                .split_once('.')
                .is_some_and(|(service, operation)| !service.is_empty() && !operation.is_empty());
            if !well_formed {
                return Err(ConfigError::invalid_value(
                    "request_filter",
                    entry.as_str(),
                    "expected `service.operation`",
                ));
            }
        }
        Ok(())
    }
}

fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}
