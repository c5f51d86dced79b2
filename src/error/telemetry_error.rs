//! Unified error type for the telemetry client.
//!
//! `TelemetryError` consolidates the domain-specific errors so callers outside
//! the streaming core (configuration loading, the CLI) can categorize and
//! report them uniformly.

use thiserror::Error;

use super::category::ErrorCategory;
use super::config::ConfigError;
use super::frame::FrameError;
use super::transition::TransitionError;
use super::transport::TransportError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl TelemetryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TelemetryError::Transport(err) => match err {
                TransportError::Rejected { .. } | TransportError::Closed { .. } => {
                    ErrorCategory::Server
                }
                TransportError::InvalidEndpoint { .. } => ErrorCategory::Configuration,
                _ => ErrorCategory::Network,
            },
            TelemetryError::Frame(_) => ErrorCategory::Protocol,
            TelemetryError::Config(_) => ErrorCategory::Configuration,
            TelemetryError::Transition(_) => ErrorCategory::Client,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Transport(err) => err.is_retryable(),
            _ => false,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            TelemetryError::Transport(err) => err.error_code(),
            TelemetryError::Frame(err) => err.error_code(),
            TelemetryError::Config(err) => err.error_code(),
            TelemetryError::Transition(_) => "E_STATE_TRANSITION",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            TelemetryError::Transport(err) => err.user_message(),
            TelemetryError::Frame(err) => err.user_message(),
            TelemetryError::Config(err) => err.to_string(),
            TelemetryError::Transition(err) => err.to_string(),
        }
    }

    /// Recovery hint for the error's category.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}
