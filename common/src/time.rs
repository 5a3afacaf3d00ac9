//! Time utilities and constants for PointLedger.

use chrono::{DateTime, TimeZone, Utc};

/// Protocol timing constants.
pub mod constants {
    use std::time::Duration;

    /// Default bound on waiting for a user's lock (5 seconds).
    pub const fn lock_acquisition_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Current wall clock as epoch milliseconds.
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Convert epoch milliseconds back to a timestamp.
pub fn from_millis(millis: i64) -> Option<Timestamp> {
    Utc.timestamp_millis_opt(millis).single()
}
