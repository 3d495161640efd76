//! Unified error type for the DataBrain client.

use std::fmt;

use super::category::ErrorCategory;
use super::config::ConfigError;
use super::stream::StreamError;
use crate::traits::HttpError;

/// Unified error type for the DataBrain client.
#[derive(Debug)]
pub enum DataBrainError {
    /// Transport-level HTTP errors.
    Http(HttpError),

    /// Answer stream and channel errors.
    Stream(StreamError),

    /// Configuration and request validation errors.
    Config(ConfigError),

    /// JSON (de)serialization errors.
    Json(serde_json::Error),

    /// Local I/O errors.
    Io(std::io::Error),
}

impl DataBrainError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            DataBrainError::Http(err) => match err {
                HttpError::ServerError { status, .. } if *status >= 500 => ErrorCategory::Server,
                HttpError::ServerError { .. } | HttpError::InvalidUrl(_) => ErrorCategory::Client,
                _ => ErrorCategory::Network,
            },
            DataBrainError::Stream(err) => match err {
                StreamError::Rejected { status, .. } if *status < 500 => ErrorCategory::Client,
                StreamError::Rejected { .. } | StreamError::ConnectionClosed => {
                    ErrorCategory::Server
                }
                StreamError::ReconnectExhausted { .. } | StreamError::Cancelled => {
                    ErrorCategory::User
                }
                _ => ErrorCategory::Network,
            },
            DataBrainError::Config(_) => ErrorCategory::Configuration,
            DataBrainError::Json(_) => ErrorCategory::Client,
            DataBrainError::Io(_) => ErrorCategory::System,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            DataBrainError::Stream(err) => err.is_retryable(),
            _ => self.category().is_retryable(),
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            DataBrainError::Http(err) => err.to_string(),
            DataBrainError::Stream(err) => err.user_message(),
            DataBrainError::Config(err) => err.to_string(),
            DataBrainError::Json(err) => format!("Received invalid data: {}", err),
            DataBrainError::Io(err) => format!("I/O error: {}", err),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            DataBrainError::Http(_) => "E_HTTP",
            DataBrainError::Stream(err) => err.error_code(),
            DataBrainError::Config(err) => err.error_code(),
            DataBrainError::Json(_) => "E_JSON",
            DataBrainError::Io(_) => "E_IO",
        }
    }

    /// Get the recovery hint for this error.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}

impl fmt::Display for DataBrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataBrainError::Http(err) => write!(f, "{}", err),
            DataBrainError::Stream(err) => write!(f, "{}", err),
            DataBrainError::Config(err) => write!(f, "{}", err),
            DataBrainError::Json(err) => write!(f, "JSON error: {}", err),
            DataBrainError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for DataBrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataBrainError::Http(err) => Some(err),
            DataBrainError::Stream(err) => Some(err),
            DataBrainError::Config(err) => Some(err),
            DataBrainError::Json(err) => Some(err),
            DataBrainError::Io(err) => Some(err),
        }
    }
}

impl From<HttpError> for DataBrainError {
    fn from(err: HttpError) -> Self {
        DataBrainError::Http(err)
    }
}

impl From<StreamError> for DataBrainError {
    fn from(err: StreamError) -> Self {
        DataBrainError::Stream(err)
    }
}

impl From<ConfigError> for DataBrainError {
    fn from(err: ConfigError) -> Self {
        DataBrainError::Config(err)
    }
}

impl From<serde_json::Error> for DataBrainError {
    fn from(err: serde_json::Error) -> Self {
        DataBrainError::Json(err)
    }
}

impl From<std::io::Error> for DataBrainError {
    fn from(err: std::io::Error) -> Self {
        DataBrainError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_http_error_category() {
        let err = DataBrainError::Http(HttpError::ConnectionFailed("refused".to_string()));
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());

        let err = DataBrainError::Http(HttpError::ServerError {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Server);

        let err = DataBrainError::Http(HttpError::ServerError {
            status: 404,
            message: "missing".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Client);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_stream_error_category() {
        let err: DataBrainError = StreamError::ReconnectExhausted { attempts: 3 }.into();
        assert_eq!(err.category(), ErrorCategory::User);
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "E_STREAM_EXHAUSTED");

        let err: DataBrainError = StreamError::ConnectionLost {
            message: "reset".to_string(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: DataBrainError = ConfigError::InvalidRequest("empty query".to_string()).into();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.user_message(), "invalid request: empty query");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: DataBrainError = json_err.into();
        assert!(matches!(err, DataBrainError::Json(_)));
        assert_eq!(err.category(), ErrorCategory::Client);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err: DataBrainError = io_err.into();
        assert_eq!(err.category(), ErrorCategory::System);
        assert!(err.to_string().contains("stdout closed"));
    }
}
