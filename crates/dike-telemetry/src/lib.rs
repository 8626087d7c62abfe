//! Logging setup and counters for the Dike policy enforcement point.
//!
//! Logging is side-effectful only and never alters control flow; the
//! counters are monotonic and lossless under concurrency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogConfig, LogLevel, LogOutput};
pub use stats::{Counter, PepStats, StatsSink, StatsSnapshot};
