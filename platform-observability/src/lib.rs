//! Observability layer for an emulated cloud platform.
//!
//! Depend on this crate via `cargo add platform-observability`. It bundles the
//! observability crates behind feature flags and, with the `extension`
//! feature, wires them into an [`ObservabilityExtension`] driven by the
//! host's lifecycle.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use observability_primitives as primitives;

/// Instruments and snapshot queries (enabled by `instruments` feature).
#[cfg(feature = "instruments")]
pub use observability_instruments as instruments;

/// Lifecycle event tracing and trace files (enabled by `trace` feature).
#[cfg(feature = "trace")]
pub use observability_tracing as trace;

/// Periodic scheduler and extension lifecycle (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use observability_kernel as kernel;

/// Configuration management (enabled by `config` feature).
#[cfg(feature = "config")]
pub use observability_config as config;

#[cfg(feature = "extension")]
mod extension;
#[cfg(feature = "config")]
mod logging;
#[cfg(feature = "trace")]
mod notify;

#[cfg(feature = "extension")]
pub use extension::{ObservabilityExtension, ObservabilityExtensionBuilder};
#[cfg(feature = "config")]
pub use logging::{LogConfig, LogError, init_logging};
#[cfg(feature = "trace")]
pub use notify::{EventIdentifiers, NotificationRouter, Rejection, TracerId};
