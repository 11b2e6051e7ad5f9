//! Outcomes of an admission check.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Quota state reported alongside a counted decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum admissions per window
    pub limit: u32,
    /// Admissions left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: Instant,
}

impl RateLimitInfo {
    /// Time left until the window resets, zero if already past.
    pub fn reset_after(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }
}

/// A request that may proceed to the downstream handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Key is whitelisted; nothing was counted
    Whitelisted,
    /// Request was counted against the key's window
    Counted(RateLimitInfo),
}

/// A request that must be answered by the blocked handler.
///
/// Rejections are terminal outcomes of the middleware, not failures of the
/// application handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitRejection {
    /// Key is blacklisted; nothing was counted
    #[error("key '{key}' is blacklisted")]
    Blacklisted { key: String },

    /// Key has used up its window
    #[error("rate limit exceeded for key '{key}'")]
    LimitExceeded { key: String, info: RateLimitInfo },
}

impl RateLimitRejection {
    /// The key the rejection applies to.
    pub fn key(&self) -> &str {
        match self {
            Self::Blacklisted { key } | Self::LimitExceeded { key, .. } => key,
        }
    }
}
