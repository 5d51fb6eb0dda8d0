//! Small time helpers shared across the crate.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in microseconds since the Unix epoch.
///
/// Order and trade timestamps use microsecond resolution.
pub fn current_time_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Current time in milliseconds since the Unix epoch.
///
/// OHLC bar times use millisecond resolution.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Floor a millisecond timestamp to the given resolution in milliseconds.
pub fn floor_to_resolution(time_ms: i64, resolution_ms: i64) -> i64 {
    time_ms - time_ms.rem_euclid(resolution_ms)
}
