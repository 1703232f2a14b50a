//! Wall-clock helpers for certificate expiry.

use std::time::Duration;

/// Returns the current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Unix timestamp `ttl` from now, saturating on overflow.
pub fn expires_after(ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    now_timestamp().saturating_add(ttl)
}
