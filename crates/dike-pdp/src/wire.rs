//! PDP wire contract.
//!
//! Request and response bodies for the authz, bulk list, and roles
//! endpoints. Field names follow the PDP's JSON exactly; these shapes are
//! compatibility-critical.

use serde::{Deserialize, Serialize};

use dike_types::{AttributeBag, CacheKeyPattern};

/// An attribute bag in its wire wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireAttributes {
    /// The attributes themselves.
    #[serde(default)]
    pub attributes: AttributeBag,
}

impl From<AttributeBag> for WireAttributes {
    fn from(attributes: AttributeBag) -> Self {
        Self { attributes }
    }
}

/// A subject on the wire: attributes plus the optional opaque claims blob.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireSubject {
    /// Subject attributes.
    #[serde(default)]
    pub attributes: AttributeBag,
    /// Base64 claims blob, forwarded verbatim when the caller supplied one.
    #[serde(rename = "accessTokenBody", skip_serializing_if = "Option::is_none")]
    pub access_token_body: Option<String>,
}

/// One item of an authz endpoint request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzItem {
    /// Dotted action identifier.
    pub action: String,
    /// Resource attributes.
    pub resource: WireAttributes,
    /// Subject attributes and optional claims blob.
    pub subject: WireSubject,
    /// Optional environment attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<WireAttributes>,
}

/// The obligation attached to a decision: the subject/resource/action set
/// the decision applies to, and for how long it may be cached.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Obligation {
    /// Actions the decision covers.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Environment the decision was evaluated under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<WireAttributes>,
    /// Maximum cache age in seconds; zero means unspecified.
    #[serde(rename = "maxCacheAgeSeconds", default)]
    pub max_cache_age_seconds: u64,
    /// Subject attributes the decision applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<WireAttributes>,
    /// Resource attributes the decision applies to; absent means the
    /// decision is scoped by the request's own resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<WireAttributes>,
}

/// The decision part of one authz sub-response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    /// Whether the action is permitted.
    pub permitted: bool,
    /// Free-form deny reason; the PEP normalizes it.
    #[serde(default)]
    pub reason: Option<String>,
    /// Cache obligation.
    #[serde(default)]
    pub obligation: Option<Obligation>,
}

/// One sub-response of an authz envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzResponseItem {
    /// Sub-request status as a string, `"200"` on success.
    pub status: String,
    /// Error messages for a failed sub-request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<String>>,
    /// The decision, present on success.
    #[serde(rename = "authorizationDecision", default)]
    pub authorization_decision: Option<AuthorizationDecision>,
}

/// Response body of the authz endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzEnvelope {
    /// The pattern to store for future key synthesis.
    #[serde(rename = "cacheKeyPattern", default)]
    pub cache_key_pattern: Option<CacheKeyPattern>,
    /// One entry per sub-request, in request order.
    pub responses: Vec<AuthzResponseItem>,
}

/// The resource block of a bulk request: attributes shared by every
/// resource, plus each resource's remainder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResources {
    /// Intersection of all resource bags.
    #[serde(rename = "sharedAttributes")]
    pub shared_attributes: AttributeBag,
    /// Per-resource attributes not covered by the shared set, in batch
    /// order.
    #[serde(rename = "uniqueAttributes")]
    pub unique_attributes: Vec<AttributeBag>,
}

/// Request body of the bulk list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    /// The shared action.
    pub action: String,
    /// Shared and per-resource attributes.
    pub resources: BulkResources,
    /// The shared subject.
    pub subject: WireSubject,
    /// The shared environment, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<WireAttributes>,
}

/// One decision of a bulk envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDecisionItem {
    /// `"Permit"` or `"Deny"`.
    pub decision: String,
    /// Free-form deny reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Cache obligation.
    #[serde(default)]
    pub obligation: Option<Obligation>,
}

impl BulkDecisionItem {
    /// Whether the decision is a permit.
    pub fn permitted(&self) -> bool {
        self.decision == "Permit"
    }
}

/// Response body of the bulk list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEnvelope {
    /// The pattern to store for future key synthesis.
    #[serde(rename = "cacheKeyPattern", default)]
    pub cache_key_pattern: Option<CacheKeyPattern>,
    /// One entry per resource, in request order.
    pub decisions: Vec<BulkDecisionItem>,
}

/// One item of a roles endpoint request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesItem {
    /// Resource attributes.
    pub resource: WireAttributes,
    /// Subject attributes.
    pub subject: WireAttributes,
}
