//! Wall-clock timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time as fractional seconds since the Unix epoch.
///
/// A clock set before the epoch yields `0.0` rather than an error, since
/// callers sit on producer paths that must never fail.
#[must_use]
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
