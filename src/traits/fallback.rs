//! Secondary answer retrieval used when the event stream cannot be opened.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::models::GenerationRequest;
use crate::traits::HttpError;

/// Answer text fragments, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, HttpError>> + Send>>;

/// A non-SSE way of retrieving the answer for a request.
///
/// A [`crate::session::StreamSession`] calls this at most once, in place of a
/// stream that was rejected before any event arrived.
#[async_trait]
pub trait AnswerFallback: Send + Sync {
    /// Start retrieving the answer for `request` from `endpoint`.
    async fn stream_answer(
        &self,
        endpoint: &str,
        request: &GenerationRequest,
    ) -> Result<ChunkStream, HttpError>;
}
