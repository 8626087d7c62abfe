//! # Dike
//!
//! **Client-side Policy Enforcement Point for the Themis Platform**
//!
//! Dike sits between an application and the platform's remote Policy
//! Decision Point. Applications submit batches of authorization questions
//! of the shape `(subject, resource, action)`; Dike answers each from its
//! local decision cache or by calling the PDP over HTTP, then caches the
//! outcome under every key the PDP's obligation allows.
//!
//! # Architecture
//!
//! ```text
//!  authorize(batch) ──► reverse synthesis ──► decision cache
//!                              │ misses
//!                              ▼
//!                      batch classifier ──► bulk list call
//!                              │        └─► per-item authz call
//!                              ▼
//!                        PDP client (retry, error classification)
//!                              │
//!                              ▼
//!                  forward synthesis ──► cache writes, pattern swap
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use dike::prelude::*;
//!
//! let pep = Pep::new(PepConfig::with_api_key(api_key))?;
//!
//! let request = Request::new(
//!     "books.read",
//!     AttributeBag::new().with("id", "user-1"),
//!     AttributeBag::new().with("serviceName", "books"),
//! );
//!
//! let response = pep.authorize(&[request], "", &token).await?;
//! if response.decisions[0].permitted {
//!     // proceed
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/dike/0.1.0")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod pep;

// Re-export the data model
pub use dike_types as types;

// Re-export cache internals for embedders bringing their own store
pub use dike_cache as cache;

// Re-export configuration types
pub use dike_config as config;

// Re-export the PDP client layer
pub use dike_pdp as pdp;

// Re-export telemetry
pub use dike_telemetry as telemetry;

pub use claims::{ClaimsDecoder, ClaimsError, TokenError, TokenProvider};
pub use pep::{Pep, PepBuilder};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use dike::prelude::*;
/// ```
pub mod prelude {
    pub use crate::claims::{ClaimsDecoder, TokenProvider};
    pub use crate::pep::{Pep, PepBuilder};

    pub use dike_cache::{DecisionStore, MemoryCache};
    pub use dike_config::{Endpoints, Environment, PepConfig};
    pub use dike_types::{
        ApiError, AttributeBag, AttributeValue, Decision, InternalError, PepError, PepResult,
        Reason, Request, Response, RolesRequest,
    };
}
