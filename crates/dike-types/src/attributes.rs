//! Attribute bags: the opaque subject/resource/environment payloads.
//!
//! The PDP contract allows attribute values to be strings, nested bags, or
//! null. Values are strings in practice; key synthesis only ever projects
//! string leaves, so the nested forms survive round-trips untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single attribute value.
///
/// Modeled as a tagged value rather than raw JSON so that non-string leaves
/// are explicit at the type level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// JSON null.
    Null,
    /// A string scalar. The only shape key synthesis will project.
    String(String),
    /// A nested attribute bag.
    Bag(AttributeBag),
}

impl AttributeValue {
    /// Returns the string form of this value, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether this value is a string scalar.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<AttributeBag> for AttributeValue {
    fn from(value: AttributeBag) -> Self {
        Self::Bag(value)
    }
}

/// An ordered mapping from attribute names to values.
///
/// Backed by a `BTreeMap` so iteration order is deterministic; canonical
/// cache-key encodings rely on that.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag(BTreeMap<String, AttributeValue>);

impl AttributeBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute, replacing any previous value under the name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Chainable insert for building bags inline.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    /// Look up a string attribute by name; `None` for missing or non-string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(AttributeValue::as_str)
    }

    /// Whether the bag contains the named attribute.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Remove an attribute, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.0.remove(name)
    }

    /// Number of attributes in the bag.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over attribute names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, AttributeValue>> for AttributeBag {
    fn from(map: BTreeMap<String, AttributeValue>) -> Self {
        Self(map)
    }
}

impl<N: Into<String>, V: Into<AttributeValue>> FromIterator<(N, V)> for AttributeBag {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }
}
