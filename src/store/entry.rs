//! Entry structure for key-value pairs

use super::value::Value;

/// A stored value plus its optional expiry.
///
/// Expiry is an absolute UNIX-epoch millisecond timestamp so that
/// snapshots and replayed logs reconstruct the same deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The value
    pub value: Value,

    /// Absolute expiry in ms since the UNIX epoch; None = no expiry
    pub expire_at: Option<u64>,
}

impl Entry {
    /// Create a new entry without expiration
    pub fn new(value: Value) -> Self {
        Entry {
            value,
            expire_at: None,
        }
    }

    /// Create a new entry with an absolute expiry
    pub fn with_expiry(value: Value, expire_at: u64) -> Self {
        Entry {
            value,
            expire_at: Some(expire_at),
        }
    }

    /// Check whether the entry is expired at `now` (ms since epoch)
    pub fn is_expired(&self, now: u64) -> bool {
        match self.expire_at {
            Some(at) => now >= at,
            None => false,
        }
    }

    /// Remaining TTL in milliseconds at `now`.
    ///
    /// Returns:
    /// - Some(n), n >= 0: remaining lifetime
    /// - None: no expiry set
    pub fn ttl_ms(&self, now: u64) -> Option<u64> {
        self.expire_at.map(|at| at.saturating_sub(now))
    }

    /// Approximate memory usage of this entry in bytes
    pub fn memory_usage(&self) -> usize {
        self.value.memory_usage() + std::mem::size_of::<Option<u64>>()
    }
}
