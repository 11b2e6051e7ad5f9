//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cache::Cache;
use crate::config::RateLimitConfig;

use super::decision::{Admission, RateLimitInfo, RateLimitRejection};
use super::overrides::{AccessList, Override};
use super::record::CounterRecord;

/// Default admissions per window when the configuration leaves it at zero.
const DEFAULT_MAX_REQUESTS: u32 = 5;
/// Default window when the configuration leaves it at zero.
const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// A counter record behind its own lock, so updates for one key serialize
/// without holding the cache lock.
type RecordSlot = Arc<Mutex<CounterRecord>>;

/// Fixed-window rate limiter keyed by arbitrary strings.
///
/// Each key gets one [`CounterRecord`] per window, stored in an owned
/// [`Cache`] whose entry TTL is the window length. Whitelisted and
/// blacklisted keys are resolved before any record is touched.
///
/// This struct is thread-safe and can be shared across multiple tasks.
/// It must be created within a Tokio runtime.
pub struct RateLimiter {
    /// Admissions allowed per window
    max_requests: u32,
    /// Fixed window length
    window: Duration,
    /// Keys that skip counting
    overrides: AccessList,
    /// Counter records indexed by key
    records: Cache<RecordSlot>,
}

impl RateLimiter {
    /// Create a rate limiter from configuration.
    ///
    /// A zero `max_requests` or window falls back to the defaults (5 per 1s).
    pub fn new(config: &RateLimitConfig) -> Self {
        let max_requests = if config.max_requests == 0 {
            DEFAULT_MAX_REQUESTS
        } else {
            config.max_requests
        };
        let window = if config.window_ms == 0 {
            DEFAULT_WINDOW
        } else {
            config.window()
        };

        debug!(
            max_requests = max_requests,
            window = ?window,
            whitelisted = config.whitelist.len(),
            blacklisted = config.blacklist.len(),
            "Creating rate limiter"
        );

        Self {
            max_requests,
            window,
            overrides: AccessList::new(
                config.whitelist.iter().cloned(),
                config.blacklist.iter().cloned(),
            ),
            records: Cache::new(window),
        }
    }

    /// Check whether a request for `key` may proceed.
    ///
    /// Whitelisted keys are admitted and blacklisted keys rejected without
    /// counting. Every other call counts against the key's current window.
    /// Calls for the same key behave as if processed one at a time.
    pub fn check(&self, key: &str) -> Result<Admission, RateLimitRejection> {
        match self.overrides.lookup(key) {
            Some(Override::Allow) => {
                trace!(key = %key, "Key whitelisted");
                return Ok(Admission::Whitelisted);
            }
            Some(Override::Deny) => {
                debug!(key = %key, "Key blacklisted");
                return Err(RateLimitRejection::Blacklisted {
                    key: key.to_string(),
                });
            }
            None => {}
        }

        let (admitted, info) = self.hit(key);

        trace!(
            key = %key,
            admitted = admitted,
            remaining = info.remaining,
            "Checked rate limit"
        );

        if admitted {
            Ok(Admission::Counted(info))
        } else {
            debug!(key = %key, reset_after = ?info.reset_after(), "Rate limit exceeded");
            Err(RateLimitRejection::LimitExceeded {
                key: key.to_string(),
                info,
            })
        }
    }

    /// Count one request for `key` inside a single per-key critical section.
    fn hit(&self, key: &str) -> (bool, RateLimitInfo) {
        loop {
            let slot = self.records.get_or_insert_with(key, self.window, |reset_at| {
                debug!(key = %key, limit = self.max_requests, "Creating new counter record");
                Arc::new(Mutex::new(CounterRecord::new(key, self.max_requests, reset_at)))
            });

            let mut record = slot.lock();
            // The window may have closed between the lookup and the lock;
            // the next lookup replaces the expired record.
            if record.is_expired(Instant::now()) {
                continue;
            }

            let admitted = record.hit();
            let info = RateLimitInfo {
                limit: self.max_requests,
                remaining: record.remaining,
                reset_at: record.reset_at,
            };
            return (admitted, info);
        }
    }

    /// Get a snapshot of the live counter record for `key`.
    ///
    /// Returns `None` if the key has no record in the current window.
    pub fn record(&self, key: &str) -> Option<CounterRecord> {
        self.records.get(key).map(|slot| slot.lock().clone())
    }

    /// Get the number of stored counter records, including expired ones not yet swept.
    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
