//! `X-RateLimit-*` response headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::Utc;
use tokio::time::Instant;

use crate::ratelimit::RateLimitInfo;

// Header names follow https://www.ietf.org/archive/id/draft-polli-ratelimit-headers-02.html
pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// IMF-fixdate, the preferred HTTP-date format.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Set the quota headers for a counted request.
pub fn insert_quota(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert(HeaderName::from_static(X_RATELIMIT_LIMIT), HeaderValue::from(info.limit));
    headers.insert(HeaderName::from_static(X_RATELIMIT_REMAINING), HeaderValue::from(info.remaining));
    if let Ok(value) = HeaderValue::from_str(&http_date(info.reset_at)) {
        headers.insert(HeaderName::from_static(X_RATELIMIT_RESET), value);
    }
}

/// Set zeroed headers for a blacklisted key.
pub fn insert_blocked(headers: &mut HeaderMap) {
    headers.insert(HeaderName::from_static(X_RATELIMIT_LIMIT), HeaderValue::from(0u32));
    headers.insert(HeaderName::from_static(X_RATELIMIT_REMAINING), HeaderValue::from(0u32));
    headers.insert(HeaderName::from_static(X_RATELIMIT_RESET), HeaderValue::from(0u32));
}

/// Format a monotonic instant as a wall-clock HTTP-date.
pub fn http_date(at: Instant) -> String {
    let until = at.saturating_duration_since(Instant::now());
    let offset = chrono::Duration::from_std(until).unwrap_or_else(|_| chrono::Duration::zero());
    (Utc::now() + offset).format(HTTP_DATE_FORMAT).to_string()
}
