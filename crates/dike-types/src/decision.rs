//! Decisions returned to callers.

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeBag;

/// Why a request was denied.
///
/// The PDP reports reasons as free-form strings; the PEP collapses them into
/// a small taxonomy so callers can branch without string matching. Both
/// `"Network"` and `"Context"` normalize to [`Reason::Context`]; every other
/// deny reason maps to [`Reason::Iam`]. Permits carry [`Reason::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Permitted, or no reason reported.
    #[default]
    None,
    /// Denied by IAM policy.
    Iam,
    /// Denied by context restrictions (network rules and similar).
    Context,
}

impl Reason {
    /// Normalize a PDP reason string for a deny decision.
    pub fn from_pdp(reason: &str) -> Self {
        match reason {
            "Network" | "Context" => Self::Context,
            _ => Self::Iam,
        }
    }
}

/// The answer to one authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the action is permitted.
    pub permitted: bool,
    /// Whether the answer came from the decision cache.
    pub cached: bool,
    /// Whether the cached entry had already expired (stale fallback).
    pub expired: bool,
    /// Number of retried PDP calls behind this decision.
    #[serde(rename = "retryCount")]
    pub retry_count: u32,
    /// Deny taxonomy; [`Reason::None`] when permitted.
    pub reason: Reason,
}

impl Decision {
    /// A fresh (non-cached) decision from a PDP response.
    pub fn fresh(permitted: bool, reason: Reason, retry_count: u32) -> Self {
        Self {
            permitted,
            cached: false,
            expired: false,
            retry_count,
            reason,
        }
    }

    /// A decision served from the cache.
    pub fn from_cache(permitted: bool, reason: Reason, expired: bool) -> Self {
        Self {
            permitted,
            cached: true,
            expired,
            retry_count: 0,
            reason,
        }
    }
}

/// The ordered answers to one `authorize` batch.
///
/// `decisions[i]` answers request `i` of the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// The trace id the call ran under (caller-supplied or generated).
    pub trace: String,
    /// One decision per request, in batch order.
    pub decisions: Vec<Decision>,
    /// Set when expired cache entries were served because the PDP was
    /// unreachable; carries the upstream error string.
    #[serde(rename = "errorForExpiredResults", skip_serializing_if = "Option::is_none")]
    pub error_for_expired_results: Option<String>,
}

impl Response {
    /// A response with no stale-fallback annotation.
    pub fn new(trace: impl Into<String>, decisions: Vec<Decision>) -> Self {
        Self {
            trace: trace.into(),
            decisions,
            error_for_expired_results: None,
        }
    }
}

/// Role assignments for one roles request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleActions {
    /// Attributes identifying the role (e.g. role CRN, display name).
    pub attributes: AttributeBag,
    /// Actions granted by the role.
    #[serde(rename = "roleActions", default)]
    pub role_actions: Vec<String>,
    /// Platform-level extensions to the role.
    #[serde(rename = "platformExtensions", default)]
    pub platform_extensions: PlatformExtensions,
}

/// Platform-level role extensions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformExtensions {
    /// Additional platform actions granted by the role.
    #[serde(rename = "roleActions", default)]
    pub role_actions: Vec<String>,
}
