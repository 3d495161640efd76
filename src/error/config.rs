//! Configuration and request validation errors.

use thiserror::Error;

/// Errors raised while reading configuration or validating a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// A generation request failed validation before being sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ConfigError {
    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::InvalidValue { .. } => "E_CONFIG_VALUE",
            ConfigError::InvalidRequest(_) => "E_CONFIG_REQUEST",
        }
    }
}
