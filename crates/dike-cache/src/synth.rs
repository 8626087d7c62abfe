//! Cache-key synthesis.
//!
//! Forward synthesis turns a PDP obligation into the set of keys a decision
//! is stored under. Reverse synthesis probes the cache for a user request by
//! trying the fallback key and then every subject/resource projection the
//! current pattern allows. Both share [`match_tuple`], which reproduces the
//! PDP's attribute-matching semantics client-side.

use dike_types::{AttributeBag, CacheKeyPattern, KeySegment, Request};

use crate::cache::{CachedDecision, DecisionStore};
use crate::key::CacheKey;

/// Scan `tuples` in order and serialize the first one `attrs` satisfies.
///
/// A tuple matches when its length equals the bag size and every named
/// attribute is present with a string value; the segment lists `name:value`
/// pairs in tuple order. The empty tuple matches exactly the empty bag and
/// yields an empty segment. Returns `None` when nothing matches.
pub fn match_tuple(attrs: &AttributeBag, tuples: &[Vec<String>]) -> Option<String> {
    for tuple in tuples {
        if tuple.len() != attrs.len() {
            continue;
        }
        let mut parts = Vec::with_capacity(tuple.len());
        let mut matched = true;
        for name in tuple {
            match attrs.get_str(name) {
                Some(value) => parts.push(format!("{name}:{value}")),
                None => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some(parts.join(","));
        }
    }
    None
}

/// Synthesize a pattern key for `(subject, resource, action)` under
/// `pattern`. Fails when the action is empty or any segment has no matching
/// tuple.
pub fn pattern_key(
    action: &str,
    subject: &AttributeBag,
    resource: &AttributeBag,
    pattern: &CacheKeyPattern,
) -> Option<CacheKey> {
    if action.is_empty() || !pattern.is_valid() {
        return None;
    }

    let subject_seg = match_tuple(subject, &pattern.subject)?;
    let resource_seg = match_tuple(resource, &pattern.resource)?;

    let mut segments = Vec::with_capacity(3);
    for slot in &pattern.order {
        match slot {
            KeySegment::Subject => segments.push(subject_seg.clone()),
            KeySegment::Resource => segments.push(resource_seg.clone()),
            KeySegment::Action => segments.push(format!("action:{action}")),
        }
    }
    Some(CacheKey::from_raw(segments.join(";")))
}

/// The obligation fields forward synthesis keys a decision under.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObligationKeys<'a> {
    /// Subject attributes the decision applies to.
    pub subject: Option<&'a AttributeBag>,
    /// Resource attributes the decision applies to; when the PDP omits
    /// them, keys fall back to the original request's resource bag.
    pub resource: Option<&'a AttributeBag>,
    /// The actions the decision covers.
    pub actions: &'a [String],
}

/// Derive the cache keys a fresh decision is written under.
///
/// Permits get one pattern key per obligation action plus the fallback key
/// of the literal original request. Denies never broaden: they get the
/// fallback key only.
pub fn forward_keys(
    original: &Request,
    obligation: &ObligationKeys<'_>,
    pattern: Option<&CacheKeyPattern>,
    permitted: bool,
) -> Vec<CacheKey> {
    let mut keys = Vec::new();

    if permitted {
        if let Some(pattern) = pattern {
            let subject = obligation.subject.unwrap_or(&original.subject);
            let resource = obligation.resource.unwrap_or(&original.resource);
            for action in obligation.actions {
                if let Some(key) = pattern_key(action, subject, resource, pattern) {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
    }

    let fallback = CacheKey::fallback(original);
    if !keys.contains(&fallback) {
        keys.push(fallback);
    }
    keys
}

/// Project `attrs` onto the names in `tuple`. `None` when any name is
/// missing or holds a non-string value.
fn project(attrs: &AttributeBag, tuple: &[String]) -> Option<AttributeBag> {
    let mut projected = AttributeBag::new();
    for name in tuple {
        projected.insert(name.clone(), attrs.get_str(name)?);
    }
    Some(projected)
}

/// Probe the cache for a request.
///
/// Tries the exact-match fallback key first, then every subject/resource
/// projection the pattern allows (outer loop subject, inner loop resource).
/// The first hit wins. Projections wider than the request's bags, or naming
/// absent attributes, are skipped.
pub fn reverse_lookup(
    request: &Request,
    pattern: Option<&CacheKeyPattern>,
    store: &dyn DecisionStore,
) -> Option<(CacheKey, CachedDecision)> {
    let fallback = CacheKey::fallback(request);
    if let Some(decision) = store.get(&fallback) {
        return Some((fallback, decision));
    }

    let pattern = pattern?;
    if !pattern.is_valid() || request.action.is_empty() {
        return None;
    }

    for subject_tuple in &pattern.subject {
        let Some(subject) = project(&request.subject, subject_tuple) else {
            continue;
        };
        for resource_tuple in &pattern.resource {
            if resource_tuple.len() > request.resource.len() {
                continue;
            }
            let Some(resource) = project(&request.resource, resource_tuple) else {
                continue;
            };
            if let Some(key) = pattern_key(&request.action, &subject, &resource, pattern) {
                if let Some(decision) = store.get(&key) {
                    return Some((key, decision));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dike_types::Reason;

    use super::*;
    use crate::cache::MemoryCache;

    fn books_pattern() -> CacheKeyPattern {
        CacheKeyPattern {
            order: vec![KeySegment::Subject, KeySegment::Resource, KeySegment::Action],
            subject: vec![vec!["id".into()]],
            resource: vec![vec!["serviceName".into()]],
        }
    }

    fn books_request(instance: &str) -> Request {
        Request::new(
            "books.read",
            AttributeBag::new().with("id", "U"),
            AttributeBag::new()
                .with("serviceName", "books")
                .with("serviceInstance", instance)
                .with("accountId", "A"),
        )
    }

    #[test]
    fn test_match_tuple_first_success_wins() {
        let attrs = AttributeBag::new().with("id", "U").with("scope", "read");
        let tuples = vec![
            vec!["id".to_string()],
            vec!["id".to_string(), "scope".to_string()],
            vec!["scope".to_string(), "id".to_string()],
        ];
        // The one-name tuple fails on length; the first two-name tuple wins.
        assert_eq!(match_tuple(&attrs, &tuples), Some("id:U,scope:read".into()));
    }

    #[test]
    fn test_match_tuple_requires_string_values() {
        let attrs = AttributeBag::new().with("id", AttributeBag::new().with("nested", "x"));
        assert_eq!(match_tuple(&attrs, &[vec!["id".to_string()]]), None);
    }

    #[test]
    fn test_match_tuple_empty_cases() {
        let empty = AttributeBag::new();
        assert_eq!(match_tuple(&empty, &[vec![]]), Some(String::new()));
        assert_eq!(match_tuple(&empty, &[vec!["id".to_string()]]), None);

        let nonempty = AttributeBag::new().with("id", "U");
        assert_eq!(match_tuple(&nonempty, &[vec![]]), None);
    }

    #[test]
    fn test_pattern_key_shape() {
        let key = pattern_key(
            "books.read",
            &AttributeBag::new().with("id", "U"),
            &AttributeBag::new().with("serviceName", "books"),
            &books_pattern(),
        )
        .unwrap();
        assert_eq!(key.as_str(), "id:U;serviceName:books;action:books.read");
    }

    #[test]
    fn test_pattern_key_respects_order() {
        let mut pattern = books_pattern();
        pattern.order = vec![KeySegment::Action, KeySegment::Subject, KeySegment::Resource];
        let key = pattern_key(
            "books.read",
            &AttributeBag::new().with("id", "U"),
            &AttributeBag::new().with("serviceName", "books"),
            &pattern,
        )
        .unwrap();
        assert_eq!(key.as_str(), "action:books.read;id:U;serviceName:books");
    }

    #[test]
    fn test_pattern_key_missing_action_or_segment() {
        let pattern = books_pattern();
        let subject = AttributeBag::new().with("id", "U");
        let resource = AttributeBag::new().with("serviceName", "books");
        assert!(pattern_key("", &subject, &resource, &pattern).is_none());
        assert!(pattern_key("a.b", &AttributeBag::new(), &resource, &pattern).is_none());
    }

    #[test]
    fn test_forward_keys_for_permit() {
        let original = books_request("inst-1");
        let ob_subject = AttributeBag::new().with("id", "U");
        let ob_resource = AttributeBag::new().with("serviceName", "books");
        let actions = vec!["books.read".to_string(), "books.write".to_string()];

        let keys = forward_keys(
            &original,
            &ObligationKeys {
                subject: Some(&ob_subject),
                resource: Some(&ob_resource),
                actions: &actions,
            },
            Some(&books_pattern()),
            true,
        );

        let raw: Vec<_> = keys.iter().map(CacheKey::as_str).collect();
        assert!(raw.contains(&"id:U;serviceName:books;action:books.read"));
        assert!(raw.contains(&"id:U;serviceName:books;action:books.write"));
        assert!(keys.iter().any(CacheKey::is_fallback));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_forward_keys_for_deny_is_fallback_only() {
        let original = books_request("inst-1");
        let ob_subject = AttributeBag::new().with("id", "U");
        let actions = vec!["books.read".to_string()];

        let keys = forward_keys(
            &original,
            &ObligationKeys {
                subject: Some(&ob_subject),
                resource: None,
                actions: &actions,
            },
            Some(&books_pattern()),
            false,
        );

        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_fallback());
    }

    #[test]
    fn test_forward_keys_obligation_without_resource_uses_request_bag() {
        // The PDP omitted resource attributes; keys project the original
        // request's resource bag down to the pattern tuple.
        let original = Request::new(
            "books.read",
            AttributeBag::new().with("id", "U"),
            AttributeBag::new().with("serviceName", "books"),
        );
        let ob_subject = AttributeBag::new().with("id", "U");
        let actions = vec!["books.read".to_string()];

        let keys = forward_keys(
            &original,
            &ObligationKeys {
                subject: Some(&ob_subject),
                resource: None,
                actions: &actions,
            },
            Some(&books_pattern()),
            true,
        );

        let raw: Vec<_> = keys.iter().map(CacheKey::as_str).collect();
        assert!(raw.contains(&"id:U;serviceName:books;action:books.read"));
    }

    #[test]
    fn test_reverse_lookup_fallback_fast_path() {
        let store = MemoryCache::new(1);
        let request = books_request("inst-1");
        store.set(
            CacheKey::fallback(&request),
            false,
            Duration::from_secs(60),
            Reason::Iam,
        );

        let (key, decision) = reverse_lookup(&request, None, &store).unwrap();
        assert!(key.is_fallback());
        assert!(!decision.permitted);
    }

    #[test]
    fn test_reverse_lookup_projects_extra_attributes_away() {
        let store = MemoryCache::new(1);
        let pattern = books_pattern();

        // Cache a permit the way forward synthesis would for the obligation.
        store.set(
            CacheKey::from_raw("id:U;serviceName:books;action:books.write"),
            true,
            Duration::from_secs(60),
            Reason::None,
        );

        // A request with a different serviceInstance still projects onto the
        // same tuples and hits.
        let mut request = books_request("other-instance");
        request.action = "books.write".to_string();

        let (key, decision) = reverse_lookup(&request, Some(&pattern), &store).unwrap();
        assert_eq!(key.as_str(), "id:U;serviceName:books;action:books.write");
        assert!(decision.permitted);
    }

    #[test]
    fn test_reverse_lookup_skips_oversized_tuples() {
        let store = MemoryCache::new(1);
        let pattern = CacheKeyPattern {
            order: vec![KeySegment::Subject, KeySegment::Resource, KeySegment::Action],
            subject: vec![vec!["id".into()]],
            resource: vec![
                vec!["serviceName".into(), "serviceInstance".into(), "accountId".into()],
                vec!["serviceName".into()],
            ],
        };
        store.set(
            CacheKey::from_raw("id:U;serviceName:books;action:books.read"),
            true,
            Duration::from_secs(60),
            Reason::None,
        );

        // Only two resource attributes: the three-name tuple is skipped, the
        // one-name tuple still hits.
        let request = Request::new(
            "books.read",
            AttributeBag::new().with("id", "U"),
            AttributeBag::new().with("serviceName", "books").with("region", "eu"),
        );
        assert!(reverse_lookup(&request, Some(&pattern), &store).is_some());
    }

    #[test]
    fn test_reverse_lookup_miss() {
        let store = MemoryCache::new(1);
        let request = books_request("inst-1");
        assert!(reverse_lookup(&request, Some(&books_pattern()), &store).is_none());
    }

    #[test]
    fn test_forward_then_reverse_round_trip() {
        let store = MemoryCache::new(1);
        let pattern = books_pattern();
        let original = books_request("inst-1");
        let ob_subject = AttributeBag::new().with("id", "U");
        let ob_resource = AttributeBag::new().with("serviceName", "books");
        let actions = vec!["books.read".to_string(), "books.write".to_string()];

        for key in forward_keys(
            &original,
            &ObligationKeys {
                subject: Some(&ob_subject),
                resource: Some(&ob_resource),
                actions: &actions,
            },
            Some(&pattern),
            true,
        ) {
            store.set(key, true, Duration::from_secs(60), Reason::None);
        }

        // Any request projecting to the same tuples and action hits,
        // whatever its extra attributes.
        let mut probe = books_request("a-completely-different-instance");
        probe.action = "books.write".to_string();
        let (_, decision) = reverse_lookup(&probe, Some(&pattern), &store).unwrap();
        assert!(decision.permitted);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn attr_name() -> impl Strategy<Value = String> {
            "[a-z][a-zA-Z0-9]{0,8}"
        }

        fn attr_value() -> impl Strategy<Value = String> {
            "[a-zA-Z0-9._-]{1,12}"
        }

        proptest! {
            // Extra attributes on the probing request never break a hit on
            // a key cached from the obligation's projection.
            #[test]
            fn reverse_hits_regardless_of_extra_attrs(
                subject_id in attr_value(),
                service in attr_value(),
                action in "[a-z]{1,8}\\.[a-z]{1,8}",
                extras in prop::collection::btree_map(attr_name(), attr_value(), 0..4),
            ) {
                let pattern = CacheKeyPattern {
                    order: vec![KeySegment::Subject, KeySegment::Resource, KeySegment::Action],
                    subject: vec![vec!["id".into()]],
                    resource: vec![vec!["serviceName".into()]],
                };

                let store = MemoryCache::new(1);
                let cached = pattern_key(
                    &action,
                    &AttributeBag::new().with("id", subject_id.as_str()),
                    &AttributeBag::new().with("serviceName", service.as_str()),
                    &pattern,
                ).unwrap();
                store.set(cached, true, std::time::Duration::from_secs(60), Reason::None);

                let mut resource = AttributeBag::new().with("serviceName", service.as_str());
                for (name, value) in &extras {
                    if name != "serviceName" {
                        resource.insert(name.clone(), value.as_str());
                    }
                }
                let probe = Request::new(
                    action.clone(),
                    AttributeBag::new().with("id", subject_id.as_str()),
                    resource,
                );

                prop_assert!(reverse_lookup(&probe, Some(&pattern), &store).is_some());
            }
        }
    }
}
