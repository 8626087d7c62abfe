//! Cache keys.
//!
//! Two canonical shapes exist. Pattern keys concatenate projected
//! subject/resource/action segments in the order the PDP's pattern dictates.
//! Fallback keys canonically encode the full request so a literal repeat
//! always hits, whatever the pattern looks like.

use std::fmt;

use dike_types::Request;

/// Prefix distinguishing fallback keys from pattern keys.
const FALLBACK_PREFIX: &str = "req=";

/// An opaque cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-serialized key.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The canonical fallback key for a request.
    ///
    /// Attribute bags are backed by ordered maps, so the JSON encoding is
    /// deterministic for equal requests.
    pub fn fallback(request: &Request) -> Self {
        // Request serialization cannot fail: the model contains only maps,
        // strings, and nulls.
        let encoded = serde_json::to_string(request).unwrap_or_default();
        Self(format!("{FALLBACK_PREFIX}{encoded}"))
    }

    /// Whether this is a fallback (full-request) key.
    pub fn is_fallback(&self) -> bool {
        self.0.starts_with(FALLBACK_PREFIX)
    }

    /// The serialized form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte length of the serialized form; used for cache budgeting.
    pub fn byte_len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
