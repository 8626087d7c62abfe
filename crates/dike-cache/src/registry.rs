//! Process-wide cache-key pattern registry.
//!
//! The PDP ships a fresh pattern on every response; the registry swaps it in
//! atomically. Readers take a snapshot once per synthesis and use it for the
//! whole synthesis, so a racing writer only affects later calls.

use parking_lot::RwLock;
use tracing::debug;

use dike_types::CacheKeyPattern;

/// Holds the current cache-key pattern.
///
/// Not a global: the orchestrator owns one instance and threads it where
/// needed.
#[derive(Debug, Default)]
pub struct PatternStore {
    current: RwLock<Option<CacheKeyPattern>>,
}

impl PatternStore {
    /// Create an empty registry. No keys can be pattern-synthesized until
    /// the first PDP response stores one.
    pub fn new() -> Self {
        Self::default()
    }

    /// A deep copy of the current pattern, if any. Consistent: never a
    /// half-swapped value.
    pub fn snapshot(&self) -> Option<CacheKeyPattern> {
        self.current.read().clone()
    }

    /// Replace the current pattern with a deep copy of `pattern`.
    ///
    /// Invalid patterns (segments missing from `order`) are dropped rather
    /// than stored; a bad pattern would poison every later synthesis.
    pub fn store(&self, pattern: CacheKeyPattern) {
        if !pattern.is_valid() {
            debug!("dropping structurally invalid cache key pattern");
            return;
        }
        *self.current.write() = Some(pattern);
    }

    /// Forget the current pattern.
    pub fn clear(&self) {
        *self.current.write() = None;
    }
}
