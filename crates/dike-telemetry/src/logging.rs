//! Structured logging for the PEP.
//!
//! Thin wrapper over the tracing-subscriber ecosystem. Library code logs
//! through `tracing` macros with structured fields; embedding applications
//! that already install a subscriber skip [`init_logging`] entirely.

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Log verbosity recognized by the configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything, including per-request cache traffic.
    Debug,
    /// Lifecycle and PDP-call events.
    #[default]
    Info,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// The env-filter directive for this level, scoped to the dike crates.
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "dike=debug",
            Self::Info => "dike=info",
            Self::Error => "dike=error",
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// Standard error (the default).
    #[default]
    Stderr,
    /// Standard output.
    Stdout,
    /// Discard everything.
    Null,
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Verbosity.
    pub level: LogLevel,
    /// Destination.
    pub output: LogOutput,
    /// Whether to emit JSON-formatted lines.
    pub json_format: bool,
}

/// Initializes the logging subsystem for processes that embed the PEP
/// without their own subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` when a global subscriber is
/// already installed or the filter is invalid.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = EnvFilter::try_new(config.level.as_filter())
        .map_err(|e| TelemetryError::LoggingInit(format!("invalid log filter: {e}")))?;

    let writer = match config.output {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Null => BoxMakeWriter::new(std::io::sink),
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}
