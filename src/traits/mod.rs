//! Trait abstractions for dependency injection and testability.
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST, streaming)
//! - [`ConversationSink`] - keyed store of transcript items
//! - [`AnswerFallback`] - non-SSE answer retrieval

pub mod fallback;
pub mod http;
pub mod sink;

pub use fallback::{AnswerFallback, ChunkStream};
pub use http::{
    event_stream_headers, json_headers, ByteStream, Headers, HttpClient, HttpError, Response,
};
pub use sink::ConversationSink;
