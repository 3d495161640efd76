//! Request-scoped answer streaming.
//!
//! A [`StreamSession`] drives one question/answer exchange: it POSTs the
//! request, decodes the event stream, and keeps the answer item in a
//! [`ConversationSink`] up to date. When the stream is rejected before any
//! event arrives, the configured [`AnswerFallback`] is run once in its place.
//!
//! Sessions are single-use. Construct a new one per submitted question.

mod state;

pub use state::{Fold, SessionState};

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::StreamError;
use crate::models::{ContextItem, GenerationRequest, ItemUpdate};
use crate::sse::decode_stream;
use crate::traits::{event_stream_headers, AnswerFallback, ConversationSink, HttpClient};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The event stream ran to completion.
    Completed,
    /// The event stream was rejected and the fallback produced the answer.
    Fallback,
    /// The answer item holds an error note.
    Failed,
    /// The owner abandoned the session; the answer item was left as it was.
    Cancelled,
}

/// Result of [`StreamSession::start`].
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub status: SessionStatus,
    /// Answer text accumulated, without any error note.
    pub answer: String,
    pub contexts: Vec<ContextItem>,
    pub error: Option<StreamError>,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Fallback
        )
    }
}

/// Drives one answer stream into the conversation sink.
pub struct StreamSession {
    http: Arc<dyn HttpClient>,
    sink: Arc<dyn ConversationSink>,
    fallback: Option<Arc<dyn AnswerFallback>>,
    cancel_rx: Option<watch::Receiver<bool>>,
    state: SessionState,
    error: Option<StreamError>,
}

impl StreamSession {
    pub fn new(http: Arc<dyn HttpClient>, sink: Arc<dyn ConversationSink>) -> Self {
        Self {
            http,
            sink,
            fallback: None,
            cancel_rx: None,
            state: SessionState::new(),
            error: None,
        }
    }

    /// Set the retrieval used when the stream is rejected before any event.
    pub fn with_fallback(mut self, fallback: Arc<dyn AnswerFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Abandon the session once `true` is sent on the paired sender.
    pub fn with_cancellation(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Run the exchange to completion.
    ///
    /// Writes go to the item `answer_item_id` only. On cancellation the
    /// response body is dropped mid-read and nothing further is written.
    pub async fn start(
        mut self,
        endpoint: &str,
        request: &GenerationRequest,
        answer_item_id: &str,
    ) -> SessionOutcome {
        tracing::info!("Starting answer stream for {}", answer_item_id);

        let mut cancel_rx = self.cancel_rx.clone();
        let status = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => {
                tracing::info!("Answer stream for {} cancelled", answer_item_id);
                self.error = Some(StreamError::Cancelled);
                SessionStatus::Cancelled
            }
            status = self.drive(endpoint, request, answer_item_id) => status,
        };

        tracing::info!(
            "Answer stream for {} finished: {:?} ({} chars, {} sources)",
            answer_item_id,
            status,
            self.state.answer().len(),
            self.state.contexts().len()
        );

        SessionOutcome {
            status,
            answer: self.state.answer().to_string(),
            contexts: self.state.contexts().to_vec(),
            error: self.error,
        }
    }

    /// Run the session on the tokio runtime and return a handle to it.
    pub fn spawn(
        self,
        endpoint: impl Into<String>,
        request: GenerationRequest,
        answer_item_id: impl Into<String>,
    ) -> SessionHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let session = self.with_cancellation(cancel_rx);
        let endpoint = endpoint.into();
        let answer_item_id = answer_item_id.into();

        let task = tokio::spawn(async move {
            session
                .start(&endpoint, &request, &answer_item_id)
                .await
        });

        SessionHandle { cancel_tx, task }
    }

    async fn drive(
        &mut self,
        endpoint: &str,
        request: &GenerationRequest,
        answer_item_id: &str,
    ) -> SessionStatus {
        let body = match serde_json::to_string(request) {
            Ok(body) => body,
            Err(e) => {
                let err = StreamError::Transport {
                    message: e.to_string(),
                };
                return self.fail(answer_item_id, err);
            }
        };

        let bytes = match self
            .http
            .post_stream(endpoint, &body, &event_stream_headers())
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                return self
                    .recover(endpoint, request, answer_item_id, e.into())
                    .await
            }
        };

        let mut events = decode_stream(bytes);
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    tracing::debug!("Stream event: {}", event.event_type_name());
                    match self.state.apply(&event) {
                        Fold::Update(update) => self.write(answer_item_id, update),
                        Fold::Finalize(update) => {
                            self.write(answer_item_id, update);
                            return SessionStatus::Completed;
                        }
                        Fold::Ignored => {}
                    }
                }
                Err(e) if self.state.events_received() == 0 => {
                    drop(events);
                    return self
                        .recover(endpoint, request, answer_item_id, e.into())
                        .await;
                }
                Err(e) => {
                    let err = StreamError::ConnectionLost {
                        message: e.to_string(),
                    };
                    return self.fail(answer_item_id, err);
                }
            }
        }

        if let Some(update) = self.state.finalize() {
            self.write(answer_item_id, update);
        }
        SessionStatus::Completed
    }

    /// Replace a stream that failed before its first event.
    async fn recover(
        &mut self,
        endpoint: &str,
        request: &GenerationRequest,
        answer_item_id: &str,
        err: StreamError,
    ) -> SessionStatus {
        tracing::warn!(
            "Answer stream unavailable [{}]: {}",
            err.error_code(),
            err
        );

        let Some(fallback) = self.fallback.take() else {
            return self.fail(answer_item_id, err);
        };

        tracing::info!("Falling back to plain retrieval for {}", answer_item_id);
        let mut chunks = match fallback.stream_answer(endpoint, request).await {
            Ok(chunks) => chunks,
            Err(e) => return self.fallback_failed(answer_item_id, e.into()),
        };

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(text) => {
                    if let Fold::Update(update) = self.state.apply_text(&text) {
                        self.write(answer_item_id, update);
                    }
                }
                Err(e) => return self.fallback_failed(answer_item_id, e.into()),
            }
        }

        if let Some(update) = self.state.finalize() {
            self.write(answer_item_id, update);
        }
        SessionStatus::Fallback
    }

    fn fallback_failed(&mut self, answer_item_id: &str, err: StreamError) -> SessionStatus {
        let err = StreamError::FallbackFailed {
            message: err.user_message(),
        };
        self.fail(answer_item_id, err)
    }

    fn fail(&mut self, answer_item_id: &str, err: StreamError) -> SessionStatus {
        tracing::error!(
            "Answer stream for {} failed [{}]: {}",
            answer_item_id,
            err.error_code(),
            err
        );
        if let Some(update) = self.state.fail(&err.user_message()) {
            self.write(answer_item_id, update);
        }
        self.error = Some(err);
        SessionStatus::Failed
    }

    fn write(&self, answer_item_id: &str, update: ItemUpdate) {
        if self.is_cancelled() {
            return;
        }
        if !self.sink.upsert(answer_item_id, update) {
            tracing::warn!("Sink refused update for {}", answer_item_id);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }
}

/// Resolve once cancellation is requested; never resolves without a receiver
/// or after the sender is dropped without cancelling.
async fn cancelled(cancel_rx: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel_rx {
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
    std::future::pending::<()>().await
}

/// Handle to a session running on the tokio runtime.
pub struct SessionHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    /// Ask the session to stop. It releases the response body at its next
    /// suspension point and makes no further sink writes.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end.
    pub async fn join(self) -> SessionOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Session task ended abnormally: {}", e);
                let (status, error) = if e.is_cancelled() {
                    (SessionStatus::Cancelled, StreamError::Cancelled)
                } else {
                    let message = e.to_string();
                    (SessionStatus::Failed, StreamError::Transport { message })
                };
                SessionOutcome {
                    status,
                    answer: String::new(),
                    contexts: Vec::new(),
                    error: Some(error),
                }
            }
        }
    }
}
