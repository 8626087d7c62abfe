//! Core data model for the Dike policy enforcement point.
//!
//! This crate holds the types shared by every Dike crate: attribute bags,
//! authorization requests and decisions, the PDP-supplied cache-key pattern,
//! and the exported error shapes.
//!
//! Nothing here talks to the network or holds locks; the types are plain
//! data with serde derives matching the PDP wire contract.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod decision;
pub mod error;
pub mod pattern;
pub mod request;

pub use attributes::{AttributeBag, AttributeValue};
pub use decision::{Decision, PlatformExtensions, Reason, Response, RoleActions};
pub use error::{ApiError, InternalError, PepError, PepResult};
pub use pattern::{CacheKeyPattern, KeySegment};
pub use request::{Request, RolesRequest, ACCESS_TOKEN_BODY, MAX_AUTHZ_CALL, MAX_BATCH, MAX_ROLES_BATCH};
