//! TTL selection for cache writes.
//!
//! Performed by the writer, not the cache: permits prefer the configured
//! TTL, then the obligation's `maxCacheAgeSeconds`, then the default.
//! Denies use the configured deny TTL or its default, and can be disabled
//! globally.

use std::time::Duration;

/// Default permit TTL when neither configuration nor obligation supply one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Default deny TTL when configuration does not supply one.
pub const DEFAULT_DENY_TTL: Duration = Duration::from_secs(120);

/// Writer-side TTL policy, derived from configuration.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    /// Configured permit TTL; zero means unset.
    pub permit_ttl: Duration,
    /// Configured deny TTL; zero means unset.
    pub denied_ttl: Duration,
    /// Whether denied decisions are cached at all.
    pub cache_denied: bool,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            permit_ttl: Duration::ZERO,
            denied_ttl: Duration::ZERO,
            cache_denied: true,
        }
    }
}

impl TtlPolicy {
    /// TTL for a permit, given the obligation's `maxCacheAgeSeconds`.
    pub fn permit(&self, max_cache_age_seconds: u64) -> Duration {
        if !self.permit_ttl.is_zero() {
            self.permit_ttl
        } else if max_cache_age_seconds > 0 {
            Duration::from_secs(max_cache_age_seconds)
        } else {
            DEFAULT_TTL
        }
    }

    /// TTL for a deny; `None` when denied caching is disabled.
    pub fn deny(&self) -> Option<Duration> {
        if !self.cache_denied {
            return None;
        }
        Some(if self.denied_ttl.is_zero() {
            DEFAULT_DENY_TTL
        } else {
            self.denied_ttl
        })
    }
}
