//! Fallback double that records how often it was invoked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;

use crate::models::GenerationRequest;
use crate::traits::{AnswerFallback, ChunkStream, HttpError};

#[derive(Debug, Clone)]
enum Outcome {
    Chunks(Vec<String>),
    Fail(HttpError),
}

/// [`AnswerFallback`] returning canned chunks or a canned error.
#[derive(Debug, Clone)]
pub struct MockFallback {
    outcome: Outcome,
    calls: Arc<AtomicUsize>,
}

impl MockFallback {
    /// Succeed with the given answer fragments.
    pub fn with_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcome: Outcome::Chunks(chunks.into_iter().map(Into::into).collect()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail before yielding anything.
    pub fn failing(err: HttpError) -> Self {
        Self {
            outcome: Outcome::Fail(err),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times `stream_answer` was called, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerFallback for MockFallback {
    async fn stream_answer(
        &self,
        _endpoint: &str,
        _request: &GenerationRequest,
    ) -> Result<ChunkStream, HttpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Chunks(chunks) => Ok(Box::pin(stream::iter(
                chunks.clone().into_iter().map(Ok),
            ))),
            Outcome::Fail(err) => Err(err.clone()),
        }
    }
}
