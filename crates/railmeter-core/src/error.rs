//! Error types for railmeter-core.
//!
//! Only conditions that stop a session from starting are errors. A rail value
//! that fails to parse is a [`MalformedSample`](crate::extract::MalformedSample)
//! warning, and a diagnostics tool that exits early ends the session with
//! [`StopReason::StreamEnded`](crate::report::StopReason::StreamEnded).

use thiserror::Error;

/// Main error type for railmeter operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The diagnostics executable could not be started.
    #[error("failed to launch '{command}': {source}")]
    ProcessLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// No schema is registered for the requested device tag.
    #[error("unknown device '{tag}' (known devices: {})", known.join(", "))]
    UnknownDevice { tag: String, known: Vec<String> },

    /// A device schema definition was rejected.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Session configuration was rejected before launch.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O errors while reading a captured log.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// Whether this error happened before any sampling could begin.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProcessLaunch { .. } | Self::UnknownDevice { .. } | Self::InvalidConfig(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MonitorError>;
