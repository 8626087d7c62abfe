//! Batch classification and routing.
//!
//! A miss set in which every entry shares subject, action, service name,
//! account id, resource type, and environment collapses into one bulk list
//! call; anything else goes to the per-item authz endpoint in order.

use dike_types::{AttributeBag, Request, RolesRequest, ACCESS_TOKEN_BODY};

use crate::wire::{AuthzItem, BulkRequest, BulkResources, RolesItem, WireAttributes, WireSubject};

/// Where a miss set is headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// One bulk list call covering every resource.
    Bulk(BulkRequest),
    /// A per-item authz call, preserving order.
    Authz(Vec<AuthzItem>),
}

/// Split a subject bag into wire attributes and the claims blob.
pub fn wire_subject(subject: &AttributeBag) -> WireSubject {
    let mut attributes = subject.clone();
    let access_token_body = attributes
        .remove(ACCESS_TOKEN_BODY)
        .and_then(|value| value.as_str().map(str::to_string));
    WireSubject {
        attributes,
        access_token_body,
    }
}

/// Convert requests to authz wire items, preserving order.
pub fn to_authz_items(requests: &[Request]) -> Vec<AuthzItem> {
    requests
        .iter()
        .map(|request| AuthzItem {
            action: request.action.clone(),
            resource: request.resource.clone().into(),
            subject: wire_subject(&request.subject),
            environment: request.environment.clone().map(WireAttributes::from),
        })
        .collect()
}

/// Convert roles requests to wire items, preserving order.
pub fn to_roles_items(requests: &[RolesRequest]) -> Vec<RolesItem> {
    requests
        .iter()
        .map(|request| RolesItem {
            resource: request.resource.clone().into(),
            subject: request.subject.clone().into(),
        })
        .collect()
}

/// Whether the miss set qualifies for the bulk list endpoint.
///
/// All entries must agree on subject, action, `resource.serviceName`,
/// `resource.accountId`, `resource.resourceType` (absence agreeing with
/// absence), and environment (including presence/absence).
pub fn bulk_eligible(requests: &[Request]) -> bool {
    let Some(first) = requests.first() else {
        return false;
    };

    requests.iter().skip(1).all(|request| {
        request.subject == first.subject
            && request.action == first.action
            && request.resource.get_str("serviceName") == first.resource.get_str("serviceName")
            && request.resource.get_str("accountId") == first.resource.get_str("accountId")
            && request.resource.get_str("resourceType") == first.resource.get_str("resourceType")
            && request.environment == first.environment
    })
}

/// Intersection of all resource bags.
///
/// Starts from the bag with the fewest attributes and drops any attribute
/// whose value disagrees in any other bag.
pub fn shared_attributes(resources: &[&AttributeBag]) -> AttributeBag {
    let Some(smallest) = resources.iter().min_by_key(|bag| bag.len()) else {
        return AttributeBag::new();
    };

    let mut shared = AttributeBag::new();
    for (name, value) in smallest.iter() {
        if resources.iter().all(|bag| bag.get(name) == Some(value)) {
            shared.insert(name, value.clone());
        }
    }
    shared
}

/// Build the bulk request for an eligible miss set.
fn to_bulk_request(requests: &[Request]) -> BulkRequest {
    let first = &requests[0];
    let resources: Vec<&AttributeBag> = requests.iter().map(|r| &r.resource).collect();
    let shared = shared_attributes(&resources);

    let unique_attributes = resources
        .iter()
        .map(|bag| {
            let mut unique = AttributeBag::new();
            for (name, value) in bag.iter() {
                if !shared.contains(name) {
                    unique.insert(name, value.clone());
                }
            }
            unique
        })
        .collect();

    BulkRequest {
        action: first.action.clone(),
        resources: BulkResources {
            shared_attributes: shared,
            unique_attributes,
        },
        subject: wire_subject(&first.subject),
        environment: first.environment.clone().map(WireAttributes::from),
    }
}

/// Decide the route for a miss set.
pub fn classify(requests: &[Request]) -> Route {
    if bulk_eligible(requests) {
        Route::Bulk(to_bulk_request(requests))
    } else {
        Route::Authz(to_authz_items(requests))
    }
}
