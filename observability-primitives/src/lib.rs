//! Core shared types for the platform observability layer.

#![warn(missing_docs, clippy::pedantic)]

mod clock;
mod error;
mod ids;
mod record;

/// Wall-clock helpers used when stamping events and snapshots.
pub use clock::unix_timestamp;
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier of one process session; names the trace files it writes.
pub use ids::{SessionId, TRACE_FILE_SUFFIX};
/// Ordered measurement or event record.
pub use record::Record;
