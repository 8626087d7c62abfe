//! Monotonic counters for PEP activity.
//!
//! Increments must be lossless under concurrency; the default sink is a set
//! of relaxed atomics. Embedders can forward counters elsewhere by
//! implementing [`StatsSink`].

use std::sync::atomic::{AtomicU64, Ordering};

/// The counters the orchestrator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Requests submitted across all batches.
    Requests,
    /// Permit decisions returned.
    Permits,
    /// Deny decisions returned.
    Denies,
    /// Requests answered from the cache.
    CacheHits,
    /// Requests that needed a PDP call.
    CacheMisses,
    /// HTTP calls issued to the PDP (including retries).
    PdpCalls,
    /// Retried PDP calls.
    Retries,
    /// Expired cache entries served during stale fallback.
    ExpiredServed,
}

/// Destination for PEP counters.
pub trait StatsSink: Send + Sync {
    /// Add `n` to a counter.
    fn add(&self, counter: Counter, n: u64);

    /// Increment a counter by one.
    fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }
}

/// Snapshot of the default sink's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests submitted across all batches.
    pub requests: u64,
    /// Permit decisions returned.
    pub permits: u64,
    /// Deny decisions returned.
    pub denies: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Requests that needed a PDP call.
    pub cache_misses: u64,
    /// HTTP calls issued to the PDP.
    pub pdp_calls: u64,
    /// Retried PDP calls.
    pub retries: u64,
    /// Expired entries served during stale fallback.
    pub expired_served: u64,
}

/// The default in-process stats sink.
#[derive(Debug, Default)]
pub struct PepStats {
    requests: AtomicU64,
    permits: AtomicU64,
    denies: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    pdp_calls: AtomicU64,
    retries: AtomicU64,
    expired_served: AtomicU64,
}

impl PepStats {
    /// Create a zeroed sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            permits: self.permits.load(Ordering::Relaxed),
            denies: self.denies.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            pdp_calls: self.pdp_calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            expired_served: self.expired_served.load(Ordering::Relaxed),
        }
    }
}

impl StatsSink for PepStats {
    fn add(&self, counter: Counter, n: u64) {
        let cell = match counter {
            Counter::Requests => &self.requests,
            Counter::Permits => &self.permits,
            Counter::Denies => &self.denies,
            Counter::CacheHits => &self.cache_hits,
            Counter::CacheMisses => &self.cache_misses,
            Counter::PdpCalls => &self.pdp_calls,
            Counter::Retries => &self.retries,
            Counter::ExpiredServed => &self.expired_served,
        };
        cell.fetch_add(n, Ordering::Relaxed);
    }
}
