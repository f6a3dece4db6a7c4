use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for access timestamps. Initialized
// lazily on first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Converts an `Instant` into a `Duration` since the cache's epoch.
#[inline]
pub(crate) fn instant_to_duration(instant: Instant) -> Duration {
  instant.saturating_duration_since(*CACHE_EPOCH)
}

/// The current time as a `Duration` since the epoch.
#[inline]
pub(crate) fn now_duration() -> Duration {
  instant_to_duration(Instant::now())
}

/// Time elapsed between an earlier epoch offset and now. Saturates at zero.
#[inline]
pub(crate) fn elapsed_since(then: Duration) -> Duration {
  now_duration().saturating_sub(then)
}
