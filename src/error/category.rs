//! Error category classification.
//!
//! Categories decide how the telemetry core reacts to a fault: transport
//! faults feed the reconnection path, protocol faults are logged and the
//! offending frame dropped, configuration faults stop startup.

use std::fmt;

/// High-level categorization of telemetry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport connectivity (connect refused, reset, timeout).
    /// Handled by the reconnection path.
    Network,

    /// The server closed the stream or reported a failure.
    Server,

    /// A frame could not be decoded. The frame is dropped; the stream
    /// stays up.
    Protocol,

    /// Internal misuse, such as an illegal state transition.
    Client,

    /// Invalid endpoint or retry settings.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Short label for structured log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Server => "server",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Client => "client",
            ErrorCategory::Configuration => "configuration",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Network connectivity issue",
            ErrorCategory::Server => "Telemetry server issue",
            ErrorCategory::Protocol => "Malformed telemetry frame",
            ErrorCategory::Client => "Application error",
            ErrorCategory::Configuration => "Configuration problem",
        }
    }

    /// Suggested recovery action for display next to the error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check that the benchmark host is reachable",
            ErrorCategory::Server => "The telemetry server may be restarting. Try reconnecting",
            ErrorCategory::Protocol => "The server may be running a newer protocol version",
            ErrorCategory::Client => "This may be a bug. Please report this issue if it persists",
            ErrorCategory::Configuration => "Check --endpoint and the BENCHSCOPE_* environment variables",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
