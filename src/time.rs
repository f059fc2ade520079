//! Wall-clock helpers
//!
//! Expiry timestamps and stream ids use absolute UNIX-epoch milliseconds
//! so they survive snapshots and log replay unchanged.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since the UNIX epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
