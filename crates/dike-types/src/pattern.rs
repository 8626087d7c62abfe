//! PDP-supplied cache-key patterns.
//!
//! Every PDP response carries a `cacheKeyPattern` describing which attribute
//! projections form valid cache keys. The pattern is stored process-wide and
//! drives both forward and reverse key synthesis.

use serde::{Deserialize, Serialize};

/// One segment of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySegment {
    /// The subject projection.
    Subject,
    /// The resource projection.
    Resource,
    /// The `action:<value>` segment.
    Action,
}

/// A PDP-supplied cache-key pattern.
///
/// `subject` and `resource` are ordered lists of attribute-name tuples; each
/// tuple is one acceptable projection. Tuples need not form a chain. The
/// empty resource tuple matches requests with no resource attributes and
/// yields an empty segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyPattern {
    /// Permutation of the three segments defining serialization order.
    pub order: Vec<KeySegment>,
    /// Acceptable subject projections, scanned in order.
    pub subject: Vec<Vec<String>>,
    /// Acceptable resource projections, scanned in order.
    pub resource: Vec<Vec<String>>,
}

impl CacheKeyPattern {
    /// Whether the pattern is structurally usable: all three segments appear
    /// exactly once in `order`.
    pub fn is_valid(&self) -> bool {
        self.order.len() == 3
            && self.order.contains(&KeySegment::Subject)
            && self.order.contains(&KeySegment::Resource)
            && self.order.contains(&KeySegment::Action)
    }

    /// Length of the longest subject tuple; bounds subject specificity.
    pub fn max_subject_arity(&self) -> usize {
        self.subject.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Length of the longest resource tuple; bounds resource specificity.
    pub fn max_resource_arity(&self) -> usize {
        self.resource.iter().map(Vec::len).max().unwrap_or(0)
    }
}
