//! SSE event type definitions
//!
//! Contains the event enum produced by the decoder, the raw line
//! classification, and the errors recovered while parsing payloads.

use crate::models::ContextItem;

/// Literal payload the server sends after the last event of an answer stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Represents a classified line of the response body
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Event-bearing line (`data: <payload>`), marker stripped
    Data(String),
    /// Empty line
    Empty,
    /// Anything else (comments, `event:`/`id:` fields); ignored
    Other(String),
}

/// Typed events decoded from the answer stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental fragment of the generated answer. Empty text marks the end
    /// of the answer.
    AnswerChunk { text: String },
    /// The retrieved passages for the current question
    ContextBatch {
        query: String,
        contexts: Vec<ContextItem>,
    },
    /// Explicit end-of-stream sentinel
    Done,
}

impl StreamEvent {
    /// Returns the event type name as a string for logging.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            StreamEvent::AnswerChunk { .. } => "answer",
            StreamEvent::ContextBatch { .. } => "contexts",
            StreamEvent::Done => "done",
        }
    }

    /// True for `Done` and for the empty answer chunk that doubles as an
    /// end-of-answer signal.
    pub fn is_terminal(&self) -> bool {
        match self {
            StreamEvent::Done => true,
            StreamEvent::AnswerChunk { text } => text.is_empty(),
            StreamEvent::ContextBatch { .. } => false,
        }
    }
}

/// Error type for payload parsing. The decoder logs and skips these.
#[derive(Debug, Clone, PartialEq)]
pub enum SseParseError {
    /// Payload is not valid JSON, or a known event has the wrong shape
    InvalidJson { event_type: String, source: String },
    /// JSON object without a string `type` field
    MissingType,
    /// `type` field names an event this client does not handle
    UnknownEventType(String),
}

impl std::fmt::Display for SseParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SseParseError::InvalidJson { event_type, source } => {
                write!(f, "Invalid JSON for event '{}': {}", event_type, source)
            }
            SseParseError::MissingType => write!(f, "SSE payload has no type field"),
            SseParseError::UnknownEventType(t) => write!(f, "Unknown SSE event type: {}", t),
        }
    }
}

impl std::error::Error for SseParseError {}
