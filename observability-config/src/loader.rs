//! Loading configuration from the environment and from JSON files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{ConfigError, ConfigResult, LogFormat, ObservabilityConfig};

/// Enables debug logging.
pub const ENV_DEBUG: &str = "OBSERVABILITY_DEBUG";
/// Host-wide debug switch consulted when [`ENV_DEBUG`] is unset.
pub const ENV_DEBUG_FALLBACK: &str = "DEBUG";
/// Trace file directory.
pub const ENV_CACHE_DIR: &str = "OBSERVABILITY_CACHE_DIR";
/// Trace flush period in milliseconds.
pub const ENV_FLUSH_INTERVAL_MS: &str = "OBSERVABILITY_FLUSH_INTERVAL_MS";
/// Metrics snapshot log period in milliseconds.
pub const ENV_METRICS_LOG_INTERVAL_MS: &str = "OBSERVABILITY_METRICS_LOG_INTERVAL_MS";
/// Comma separated `service.operation` allow-list.
pub const ENV_REQUEST_FILTER: &str = "OBSERVABILITY_REQUEST_FILTER";
/// Process log format.
pub const ENV_LOG_FORMAT: &str = "OBSERVABILITY_LOG_FORMAT";

/// Partial document accepted by [`ObservabilityConfig::from_json_file`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    debug: Option<bool>,
    cache_root: Option<PathBuf>,
    flush_interval_ms: Option<u64>,
    metrics_log_interval_ms: Option<u64>,
    request_filter: Option<Vec<String>>,
    log_format: Option<LogFormat>,
}

impl ObservabilityConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Self::from_lookup`].
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key/value source shaped like the
    /// environment. Unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for values that do not parse and
    /// any error raised by [`Self::validate`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let debug = lookup(ENV_DEBUG)
            .map(|value| (ENV_DEBUG, value))
            .or_else(|| lookup(ENV_DEBUG_FALLBACK).map(|value| (ENV_DEBUG_FALLBACK, value)));
        if let Some((key, value)) = debug {
            config.debug = parse_flag(key, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE_DIR).filter(|value| !value.trim().is_empty()) {
            config.cache_root = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_FLUSH_INTERVAL_MS) {
            config.flush_interval = parse_millis(ENV_FLUSH_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_METRICS_LOG_INTERVAL_MS) {
            config.metrics_log_interval =
                Some(parse_millis(ENV_METRICS_LOG_INTERVAL_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_REQUEST_FILTER) {
            config.request_filter = value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            config.log_format = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Overlays a partial JSON document on the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`] when the file
    /// cannot be read or decoded, and any error raised by [`Self::validate`].
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: FileConfig = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "loaded observability configuration file");

        let mut config = Self::default();
        if let Some(debug) = file.debug {
            config.debug = debug;
        }
        if let Some(cache_root) = file.cache_root {
            config.cache_root = cache_root;
        }
        if let Some(millis) = file.flush_interval_ms {
            config.flush_interval = Duration::from_millis(millis);
        }
        if let Some(millis) = file.metrics_log_interval_ms {
            config.metrics_log_interval = Some(Duration::from_millis(millis));
        }
        if let Some(filter) = file.request_filter {
            config.request_filter = filter;
        }
        if let Some(format) = file.log_format {
            config.log_format = format;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, value, "expected a boolean flag")),
    }
}

fn parse_millis(key: &str, value: &str) -> ConfigResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::invalid_value(key, value, "expected milliseconds"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use uuid::Uuid;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ObservabilityConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ObservabilityConfig::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ObservabilityConfig::from_lookup(lookup(&[
            (ENV_DEBUG, "true"),
            (ENV_CACHE_DIR, "/tmp/obs"),
            (ENV_FLUSH_INTERVAL_MS, "250"),
            (ENV_METRICS_LOG_INTERVAL_MS, "5000"),
            (ENV_REQUEST_FILTER, "sqs.SendMessage, lambda.Invoke ,"),
            (ENV_LOG_FORMAT, "json"),
        ]))
        .unwrap();

        assert!(config.debug());
        assert_eq!(config.cache_root(), Path::new("/tmp/obs"));
        assert_eq!(config.flush_interval(), Duration::from_millis(250));
        assert_eq!(config.metrics_log_interval(), Some(Duration::from_secs(5)));
        assert_eq!(config.request_filter(), ["sqs.SendMessage", "lambda.Invoke"]);
        assert_eq!(config.log_format(), LogFormat::Json);
    }

    #[test]
    fn debug_falls_back_to_the_host_switch() {
        let config =
            ObservabilityConfig::from_lookup(lookup(&[(ENV_DEBUG_FALLBACK, "1")])).unwrap();
        assert!(config.debug());

        let config = ObservabilityConfig::from_lookup(lookup(&[
            (ENV_DEBUG, "0"),
            (ENV_DEBUG_FALLBACK, "1"),
        ]))
        .unwrap();
        assert!(!config.debug());
    }

    #[test]
    fn unparsable_values_name_their_key() {
        let err = ObservabilityConfig::from_lookup(lookup(&[(ENV_FLUSH_INTERVAL_MS, "soon")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { key, .. } if key == ENV_FLUSH_INTERVAL_MS)
        );

        let err = ObservabilityConfig::from_lookup(lookup(&[(ENV_FLUSH_INTERVAL_MS, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn json_file_overlays_defaults() {
        let path =
            std::env::temp_dir().join(format!("observability-config-{}.json", Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{ "flush_interval_ms": 2000, "log_format": "pretty", "request_filter": ["sns.Publish"] }"#,
        )
        .unwrap();

        let config = ObservabilityConfig::from_json_file(&path).unwrap();
        assert_eq!(config.flush_interval(), Duration::from_secs(2));
        assert_eq!(config.log_format(), LogFormat::Pretty);
        assert_eq!(config.request_filter(), ["sns.Publish"]);
        assert!(!config.debug());

        std::fs::write(&path, r#"{ "flush_interval": 1 }"#).unwrap();
        assert!(matches!(
            ObservabilityConfig::from_json_file(&path),
            Err(ConfigError::Parse { .. })
        ));

        let _ = std::fs::remove_file(path);
    }
}
