//! Configuration for the platform observability layer.
//!
//! Settings come from the environment ([`ObservabilityConfig::from_env`]) or a
//! partial JSON document ([`ObservabilityConfig::from_json_file`]); anything
//! unset keeps its default.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use schema::{DEFAULT_REQUEST_FILTER, LogFormat, ObservabilityConfig};
