//! Collaborator seams for token handling.
//!
//! The PEP never parses JWTs or talks to the token service itself; both
//! concerns are injected. The default deployment wires these to the
//! platform IAM endpoints resolved by the configuration.

use async_trait::async_trait;
use thiserror::Error;

use dike_types::AttributeBag;

/// Failure decoding an `accessTokenBody` blob.
#[derive(Debug, Clone, Error)]
#[error("claims decoding failed: {0}")]
pub struct ClaimsError(pub String);

/// Decodes a subject's opaque base64 claims blob into subject attributes.
///
/// Reverse synthesis calls this before probing the cache, so implementations
/// must be cheap and must not block.
pub trait ClaimsDecoder: Send + Sync {
    /// Decode `access_token_body` into an attribute bag.
    fn decode(&self, access_token_body: &str) -> Result<AttributeBag, ClaimsError>;
}

/// Failure acquiring a bearer token.
#[derive(Debug, Clone, Error)]
#[error("token acquisition failed: {0}")]
pub struct TokenError(pub String);

/// Supplies bearer tokens for PDP calls.
///
/// Token acquisition is outside the PEP core; callers either pass tokens to
/// [`Pep::authorize`](crate::Pep::authorize) directly or drive this seam
/// from their own refresh loop.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A currently valid bearer token.
    async fn bearer_token(&self) -> Result<String, TokenError>;
}
