//! The bounded decision cache.
//!
//! Caches PDP decisions so repeated questions are answered locally. Entries
//! expire lazily: `get` returns them even past their deadline so the
//! orchestrator can serve stale decisions when the PDP is unreachable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use dike_types::Reason;

use crate::key::CacheKey;

/// Fixed per-entry overhead charged against the byte budget, on top of the
/// key length. Covers the entry struct and map bookkeeping.
const ENTRY_OVERHEAD: usize = 64;

/// A cached PDP decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedDecision {
    /// Whether the action was permitted.
    pub permitted: bool,
    /// Deny taxonomy; `Reason::None` for permits.
    pub reason: Reason,
    /// Deadline after which the entry counts as expired.
    pub expires_at: Instant,
}

impl CachedDecision {
    /// Whether the entry has passed its deadline.
    pub fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in the cache.
    pub entries: usize,
    /// Number of evictions under capacity pressure.
    pub evictions: u64,
}

/// Storage behind the decision cache.
///
/// The default is the in-process [`MemoryCache`]; callers may plug in their
/// own implementation through configuration. Implementations must be safe
/// under concurrent readers and writers: `get` never returns a torn entry,
/// and two racing `set`s on one key leave one of the two values.
pub trait DecisionStore: Send + Sync {
    /// Look up an entry. Returns it even when expired; the caller decides
    /// what expiry means. Implementations count hits and misses.
    fn get(&self, key: &CacheKey) -> Option<CachedDecision>;

    /// Store a decision under `key` with the given time-to-live,
    /// overwriting any previous entry.
    fn set(&self, key: CacheKey, permitted: bool, ttl: Duration, reason: Reason);

    /// Drop every entry and reset counters.
    fn reset(&self);

    /// Number of live entries.
    fn entries(&self) -> usize;

    /// Current statistics.
    fn stats(&self) -> CacheStats;
}

#[derive(Debug)]
struct Entry {
    decision: CachedDecision,
    written_at: Instant,
    cost: usize,
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<CacheKey, Entry>,
    bytes: usize,
}

/// The default byte-bounded in-process cache.
///
/// Capacity pressure first drops expired entries, then the oldest writes,
/// until the configured budget holds again.
#[derive(Debug)]
pub struct MemoryCache {
    inner: RwLock<Inner>,
    budget: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCache {
    /// Create a cache bounded by `size_mib` mebibytes of estimated entry
    /// cost. A zero budget disables storage entirely.
    pub fn new(size_mib: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            budget: size_mib * 1024 * 1024,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn evict_expired(inner: &mut Inner, now: Instant) -> u64 {
        let mut freed = 0u64;
        inner.map.retain(|_, entry| {
            if entry.decision.expired(now) {
                freed += 1;
                false
            } else {
                true
            }
        });
        if freed > 0 {
            inner.bytes = inner.map.values().map(|e| e.cost).sum();
        }
        freed
    }

    fn evict_oldest(inner: &mut Inner) -> bool {
        let oldest = inner
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.written_at)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                if let Some(entry) = inner.map.remove(&key) {
                    inner.bytes -= entry.cost;
                }
                true
            }
            None => false,
        }
    }
}

impl DecisionStore for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CachedDecision> {
        let inner = self.inner.read();
        match inner.map.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.decision)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn set(&self, key: CacheKey, permitted: bool, ttl: Duration, reason: Reason) {
        if self.budget == 0 {
            return;
        }

        let now = Instant::now();
        let cost = key.byte_len() + ENTRY_OVERHEAD;
        let entry = Entry {
            decision: CachedDecision {
                permitted,
                reason,
                expires_at: now + ttl,
            },
            written_at: now,
            cost,
        };

        let mut inner = self.inner.write();
        if let Some(old) = inner.map.remove(&key) {
            inner.bytes -= old.cost;
        }

        if inner.bytes + cost > self.budget {
            let freed = Self::evict_expired(&mut inner, now);
            self.evictions.fetch_add(freed, Ordering::Relaxed);
        }
        while inner.bytes + cost > self.budget {
            if Self::evict_oldest(&mut inner) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                break;
            }
        }

        inner.bytes += cost;
        inner.map.insert(key, entry);
    }

    fn reset(&self) {
        let mut inner = self.inner.write();
        inner.map.clear();
        inner.bytes = 0;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    fn entries(&self) -> usize {
        self.inner.read().map.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
