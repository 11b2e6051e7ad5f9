//! Per-key counting record for one fixed window.

use tokio::time::Instant;

/// Tracks the requests seen for one key within its current window.
///
/// The record lives in the limiter's cache with a TTL equal to the window,
/// and `reset_at` is the cache entry's expiry instant. Neither is ever
/// extended: once `reset_at` passes, the record is gone and the next request
/// opens a fresh window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRecord {
    /// The key this record counts for
    pub key: String,
    /// Requests seen in this window, admitted and denied
    pub count: u64,
    /// Admissions left in this window
    pub remaining: u32,
    /// When the window ends
    pub reset_at: Instant,
}

impl CounterRecord {
    /// Create an untouched record allowing `limit` admissions until `reset_at`.
    pub(crate) fn new(key: &str, limit: u32, reset_at: Instant) -> Self {
        Self {
            key: key.to_string(),
            count: 0,
            remaining: limit,
            reset_at,
        }
    }

    /// Count one request against this window.
    ///
    /// Returns `true` if the request is admitted. An exhausted record only
    /// advances `count`.
    pub(crate) fn hit(&mut self) -> bool {
        self.count += 1;
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }
}
