//! Line-oriented answer retrieval used when the event stream is rejected.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;

use crate::models::GenerationRequest;
use crate::sse::{data_payload, is_done_sentinel, LineBuffer};
use crate::traits::{json_headers, AnswerFallback, ChunkStream, HttpClient, HttpError};

/// Re-requests the answer and reads `data:` lines without typed decoding.
///
/// Only the `content` field of each JSON payload is used. Payloads without
/// text, context batches and malformed lines are skipped. Reading stops at
/// `[DONE]` or at end of body.
pub struct PlainStreamFallback {
    http: Arc<dyn HttpClient>,
}

impl PlainStreamFallback {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

/// What one body line means to the plain reader.
#[derive(Debug, PartialEq)]
enum PlainLine {
    Text(String),
    Skip,
    Done,
}

fn classify(line: &str) -> PlainLine {
    let Some(payload) = data_payload(line) else {
        return PlainLine::Skip;
    };
    if is_done_sentinel(&payload) {
        return PlainLine::Done;
    }
    serde_json::from_str::<Value>(&payload)
        .ok()
        .and_then(|value| value.get("content").and_then(Value::as_str).map(str::to_string))
        .filter(|text| !text.is_empty())
        .map_or(PlainLine::Skip, PlainLine::Text)
}

#[async_trait]
impl AnswerFallback for PlainStreamFallback {
    async fn stream_answer(
        &self,
        endpoint: &str,
        request: &GenerationRequest,
    ) -> Result<ChunkStream, HttpError> {
        let body = serde_json::to_string(request).map_err(|e| HttpError::Other(e.to_string()))?;
        tracing::info!("Retrying answer without event decoding: {}", endpoint);

        let bytes = self
            .http
            .post_stream(endpoint, &body, &json_headers())
            .await?;

        let chunks = stream::unfold(
            (bytes, LineBuffer::new(), VecDeque::new(), false),
            |(mut bytes, mut lines, mut ready, mut done)| async move {
                loop {
                    if let Some(text) = ready.pop_front() {
                        return Some((Ok(text), (bytes, lines, ready, done)));
                    }
                    if done {
                        return None;
                    }

                    let completed = match bytes.next().await {
                        Some(Ok(chunk)) => lines.push(&chunk),
                        Some(Err(e)) => {
                            done = true;
                            return Some((Err(e), (bytes, lines, ready, done)));
                        }
                        None => {
                            done = true;
                            lines.finish().into_iter().collect()
                        }
                    };

                    for line in completed {
                        match classify(&line) {
                            PlainLine::Text(text) => ready.push_back(text),
                            PlainLine::Skip => {}
                            PlainLine::Done => {
                                done = true;
                                break;
                            }
                        }
                    }
                }
            },
        );

        Ok(Box::pin(chunks))
    }
}
