//! Streaming-related error types.
//!
//! Errors raised while opening or reading an answer stream, running the
//! fallback retrieval, or keeping the persistent channel alive.

use std::fmt;

use crate::traits::HttpError;

/// Stream-specific error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The server answered the request with a non-success status.
    Rejected { status: u16, message: String },

    /// The request could not be sent or the response could not be read.
    Transport { message: String },

    /// The stream broke after events had started arriving.
    ConnectionLost { message: String },

    /// The server ended a persistent subscription.
    ConnectionClosed,

    /// Automatic reconnection gave up.
    ReconnectExhausted { attempts: u32 },

    /// The non-SSE fallback retrieval failed too.
    FallbackFailed { message: String },

    /// The session was abandoned by its owner.
    Cancelled,
}

impl StreamError {
    /// Check if this error is likely transient and can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Rejected { status, .. } => *status >= 500,
            StreamError::Transport { .. } | StreamError::ConnectionLost { .. } => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Rejected { status, message } => {
                format!("API request failed: {} - {}", status, message)
            }
            StreamError::Transport { message } => {
                format!("Failed to connect to server: {}", message)
            }
            StreamError::ConnectionLost { message } => {
                format!("The answer stream was interrupted: {}", message)
            }
            StreamError::ConnectionClosed => {
                "Connection to server was closed. The server might be unavailable.".to_string()
            }
            StreamError::ReconnectExhausted { .. } => {
                "Connection to server lost. Please refresh the page to try again.".to_string()
            }
            StreamError::FallbackFailed { message } => message.clone(),
            StreamError::Cancelled => "The request was cancelled.".to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::Rejected { .. } => "E_STREAM_REJECTED",
            StreamError::Transport { .. } => "E_STREAM_TRANSPORT",
            StreamError::ConnectionLost { .. } => "E_STREAM_CONN",
            StreamError::ConnectionClosed => "E_STREAM_CLOSED",
            StreamError::ReconnectExhausted { .. } => "E_STREAM_EXHAUSTED",
            StreamError::FallbackFailed { .. } => "E_STREAM_FALLBACK",
            StreamError::Cancelled => "E_STREAM_CANCELLED",
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Rejected { status, message } => {
                write!(f, "Stream request rejected ({}): {}", status, message)
            }
            StreamError::Transport { message } => write!(f, "Stream transport error: {}", message),
            StreamError::ConnectionLost { message } => {
                write!(f, "Stream connection lost: {}", message)
            }
            StreamError::ConnectionClosed => write!(f, "Server closed stream"),
            StreamError::ReconnectExhausted { attempts } => {
                write!(f, "Gave up reconnecting after {} attempts", attempts)
            }
            StreamError::FallbackFailed { message } => {
                write!(f, "Fallback retrieval failed: {}", message)
            }
            StreamError::Cancelled => write!(f, "Stream cancelled"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<HttpError> for StreamError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::ServerError { status, message } => StreamError::Rejected { status, message },
            HttpError::Cancelled => StreamError::Cancelled,
            other => StreamError::Transport {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_retryable_only_for_server_errors() {
        let err = StreamError::Rejected {
            status: 503,
            message: "busy".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "E_STREAM_REJECTED");

        let err = StreamError::Rejected {
            status: 422,
            message: "bad filters".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.user_message(), "API request failed: 422 - bad filters");
    }

    #[test]
    fn test_from_http_error() {
        let err: StreamError = HttpError::ServerError {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(
            err,
            StreamError::Rejected {
                status: 500,
                message: "boom".to_string()
            }
        );

        let err: StreamError = HttpError::ConnectionFailed("refused".to_string()).into();
        assert!(matches!(err, StreamError::Transport { .. }));
        assert!(err.user_message().contains("refused"));
    }

    #[test]
    fn test_exhausted_message_asks_for_refresh() {
        let err = StreamError::ReconnectExhausted { attempts: 3 };
        assert!(!err.is_retryable());
        assert!(err.user_message().contains("refresh"));
        assert_eq!(err.to_string(), "Gave up reconnecting after 3 attempts");
    }
}
