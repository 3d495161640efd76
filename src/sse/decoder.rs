//! Incremental decoding of an answer stream body.
//!
//! Bytes arrive in arbitrary chunks. [`LineBuffer`] reassembles complete lines,
//! [`StreamDecoder`] turns `data:` lines into [`StreamEvent`]s, and
//! [`decode_stream`] wires both onto a transport [`ByteStream`].

use std::pin::Pin;

use futures_util::stream::{self, Stream};
use futures_util::StreamExt;

use crate::sse::events::StreamEvent;
use crate::sse::parser::{data_payload, is_done_sentinel, parse_payload};
use crate::traits::{ByteStream, HttpError};

/// Stream of decoded events, ending after `Done` or at end of body.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, HttpError>> + Send>>;

/// Splits a byte stream on `\n`, keeping the incomplete tail between pushes.
///
/// Bytes are buffered rather than text so a multi-byte character split across
/// two chunks is decoded intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line completed by them, without the
    /// line terminator.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&tail);
        Some(text.trim_end_matches('\r').to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Converts raw body bytes into typed stream events.
///
/// Lines that are not `data:` lines are ignored. Payloads that fail to parse
/// are logged and skipped; they never abort decoding. Nothing is emitted
/// after `[DONE]`.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    lines: LineBuffer,
    finished: bool,
    skipped: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning the events it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let lines = self.lines.push(bytes);
        let mut events = Vec::new();
        for line in lines {
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
                if self.finished {
                    break;
                }
            }
        }
        events
    }

    /// Decode whatever remains once the body has ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        match self.lines.finish() {
            Some(line) => self.decode_line(&line).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// True once `[DONE]` has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of data lines dropped because they could not be parsed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_line(&mut self, line: &str) -> Option<StreamEvent> {
        let payload = data_payload(line)?;
        if payload.is_empty() {
            return None;
        }
        if is_done_sentinel(&payload) {
            self.finished = true;
            return Some(StreamEvent::Done);
        }

        match parse_payload(&payload) {
            Ok(event) => Some(event),
            Err(e) => {
                self.skipped += 1;
                tracing::warn!("Skipping malformed stream line: {}", e);
                tracing::debug!("Malformed payload: {}", payload);
                None
            }
        }
    }
}

/// Decode a transport byte stream into an event stream.
///
/// Transport errors are passed through as items; the consumer decides whether
/// to stop. The returned stream ends after `Done` or when the body ends.
pub fn decode_stream(bytes: ByteStream) -> EventStream {
    let events = stream::unfold(
        (
            bytes,
            StreamDecoder::new(),
            std::collections::VecDeque::new(),
            false,
        ),
        |(mut bytes, mut decoder, mut ready, mut body_done)| async move {
            loop {
                if let Some(event) = ready.pop_front() {
                    return Some((Ok(event), (bytes, decoder, ready, body_done)));
                }
                if body_done || decoder.is_finished() {
                    return None;
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        ready.extend(decoder.feed(&chunk));
                    }
                    Some(Err(e)) => {
                        // The body is unusable after a transport error.
                        body_done = true;
                        return Some((Err(e), (bytes, decoder, ready, body_done)));
                    }
                    None => {
                        body_done = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        },
    );

    Box::pin(events)
}
