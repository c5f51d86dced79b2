//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A base URL does not use a scheme the client can stream from.
    #[error("unsupported URL scheme in '{url}' (expected {expected})")]
    UnsupportedScheme { url: String, expected: &'static str },

    /// A URL is empty after trimming.
    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    /// A retry setting is out of range.
    #[error("invalid retry setting {name}: {message}")]
    InvalidRetrySetting { name: &'static str, message: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::UnsupportedScheme { .. } => "E_CONFIG_SCHEME",
            ConfigError::Empty { .. } => "E_CONFIG_EMPTY",
            ConfigError::InvalidRetrySetting { .. } => "E_CONFIG_RETRY",
        }
    }
}
