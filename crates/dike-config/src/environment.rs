//! Deployment environments and endpoint resolution.
//!
//! Named environments resolve to fixed URL sets. `Custom` carries no
//! defaults: callers must provide every endpoint explicitly.

use serde::{Deserialize, Serialize};

/// The five PDP-side URLs a deployment needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Per-item authorization endpoint (`POST`).
    pub authz: String,
    /// Bulk list endpoint (`PUT`).
    pub bulk: String,
    /// Roles endpoint (`POST`).
    pub roles: String,
    /// OAuth token endpoint, used by the token-provider collaborator.
    pub token: String,
    /// JWKS endpoint, used by the claims-decoder collaborator.
    pub jwks: String,
}

impl Endpoints {
    fn for_host(pdp: &str, iam: &str) -> Self {
        Self {
            authz: format!("https://{pdp}/v2/authz"),
            bulk: format!("https://{pdp}/v2/authz/bulk"),
            roles: format!("https://{pdp}/v2/authz/roles"),
            token: format!("https://{iam}/oauth/token"),
            jwks: format!("https://{iam}/oauth/jwks"),
        }
    }

    /// Whether every endpoint is non-empty.
    pub fn is_complete(&self) -> bool {
        !(self.authz.is_empty()
            || self.bulk.is_empty()
            || self.roles.is_empty()
            || self.token.is_empty()
            || self.jwks.is_empty())
    }
}

/// A named deployment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    /// Public staging.
    Staging,
    /// Public production (the default).
    #[default]
    Production,
    /// Caller-provided endpoints; all five are required.
    Custom,
    /// Private-network staging.
    PrivateStaging,
    /// Private-network production.
    PrivateProduction,
}

impl Environment {
    /// The fixed endpoint set for a named environment; `None` for `Custom`.
    pub fn endpoints(self) -> Option<Endpoints> {
        match self {
            Self::Staging => Some(Endpoints::for_host(
                "pdp.stage.themis.cloud",
                "iam.stage.themis.cloud",
            )),
            Self::Production => Some(Endpoints::for_host(
                "pdp.themis.cloud",
                "iam.themis.cloud",
            )),
            Self::PrivateStaging => Some(Endpoints::for_host(
                "private.pdp.stage.themis.cloud",
                "private.iam.stage.themis.cloud",
            )),
            Self::PrivateProduction => Some(Endpoints::for_host(
                "private.pdp.themis.cloud",
                "private.iam.themis.cloud",
            )),
            Self::Custom => None,
        }
    }
}
