//! PDP wire contract, transport, and HTTP client for Dike.
//!
//! This crate owns everything that crosses the network boundary: the JSON
//! bodies of the authz, bulk list, and roles endpoints, the batch
//! classifier deciding which endpoint a miss set goes to, and the retrying
//! client that turns upstream failures into the exported error surface.
//!
//! The transport itself sits behind the [`Transport`] trait so tests (and
//! embedders with special networking needs) can swap it out.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classify;
pub mod client;
pub mod transport;
pub mod wire;

pub use classify::{bulk_eligible, classify, shared_attributes, to_authz_items, to_roles_items, Route};
pub use client::{CallOutcome, PdpClient, PEP_VERSION};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};
pub use wire::{
    AuthorizationDecision, AuthzEnvelope, AuthzItem, AuthzResponseItem, BulkDecisionItem,
    BulkEnvelope, BulkRequest, BulkResources, Obligation, RolesItem, WireAttributes, WireSubject,
};
