//! Server-Sent Events decoding for the answer stream
//!
//! The generation endpoint streams lines of the form `data: <payload>`, where
//! the payload is either the literal `[DONE]` or a JSON object whose `type`
//! is `answer` or `contexts`. Blank lines, comments and other SSE fields are
//! ignored.
//!
//! # Module structure
//! - `events` - Event type definitions (StreamEvent, SseLine, SseParseError)
//! - `payloads` - Internal payload deserialization structs
//! - `parser` - Stateless line and payload parsing
//! - `decoder` - Chunk reassembly and the byte-stream to event-stream adapter

mod decoder;
mod events;
mod parser;
mod payloads;

pub use decoder::{decode_stream, EventStream, LineBuffer, StreamDecoder};
pub use events::{SseLine, SseParseError, StreamEvent, DONE_SENTINEL};
pub use parser::{data_payload, is_done_sentinel, parse_payload, parse_sse_line, parse_value};
