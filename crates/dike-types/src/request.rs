//! Authorization requests and batch limits.

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeBag;

/// Maximum number of requests in one `authorize` batch.
pub const MAX_BATCH: usize = 1000;

/// Maximum number of sub-requests per authz endpoint call.
pub const MAX_AUTHZ_CALL: usize = 100;

/// Maximum number of requests in one roles batch.
pub const MAX_ROLES_BATCH: usize = 100;

/// Subject attribute carrying an opaque base64 claims blob.
///
/// When present, reverse synthesis expands it into subject attributes via
/// the injected claims decoder before probing the cache.
pub const ACCESS_TOKEN_BODY: &str = "accessTokenBody";

/// One authorization question: may `subject` perform `action` on `resource`?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Dotted action identifier, e.g. `books.read`.
    pub action: String,
    /// Resource attributes. Opaque to the PEP.
    pub resource: AttributeBag,
    /// Subject attributes. Opaque to the PEP.
    pub subject: AttributeBag,
    /// Optional environment attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<AttributeBag>,
}

impl Request {
    /// Create a request with no environment.
    pub fn new(action: impl Into<String>, subject: AttributeBag, resource: AttributeBag) -> Self {
        Self {
            action: action.into(),
            resource,
            subject,
            environment: None,
        }
    }

    /// Attach environment attributes.
    #[must_use]
    pub fn with_environment(mut self, environment: AttributeBag) -> Self {
        self.environment = Some(environment);
        self
    }
}

/// One roles question: which roles does `subject` hold on `resource`?
///
/// Roles requests carry no action; the roles endpoint rejects batches where
/// any entry has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesRequest {
    /// Resource attributes; `accountId` must be shared across the batch.
    pub resource: AttributeBag,
    /// Subject attributes.
    pub subject: AttributeBag,
}
