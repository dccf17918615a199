//! Expiry checks with a safety margin
//!
//! Cached tokens and credentials are treated as expired slightly
//! before their actual `expires_at`, so a value handed out by a cache
//! is never already dead by the time the caller uses it.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Default buffer subtracted from every expiry timestamp.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Whether a value expiring at `expires_at` is still usable at `now`.
///
/// `true` iff more than `margin` remains before expiry. Already-expired
/// values and values inside the margin are both invalid; callers must
/// treat them identically to a cache miss.
pub fn is_valid(expires_at: DateTime<Utc>, now: DateTime<Utc>, margin: Duration) -> bool {
    // A margin too large for TimeDelta means nothing is ever valid.
    let margin = TimeDelta::from_std(margin).unwrap_or(TimeDelta::MAX);
    expires_at.signed_duration_since(now) > margin
}
