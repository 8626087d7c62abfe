//! Configuration surface and deployment environments for Dike.
//!
//! [`PepConfig`] is plain data with a chainable builder in the style of the
//! rest of the platform; validation happens once, when the orchestrator is
//! constructed, and surfaces caller mistakes as `InternalError`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod environment;

pub use config::{PepConfig, DEFAULT_CACHE_SIZE_MIB, DEFAULT_PDP_TIMEOUT};
pub use environment::{Endpoints, Environment};
