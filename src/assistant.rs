//! Question submission and backend status.
//!
//! [`Assistant`] wires configuration, the HTTP client, the transcript and the
//! fallback together. Each question gets its own [`StreamSession`].

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::adapters::{InMemoryConversation, PlainStreamFallback, ReqwestHttpClient};
use crate::channel::ReconnectingChannel;
use crate::config::ClientConfig;
use crate::error::{DataBrainResult, ResultExt};
use crate::models::{ConversationItem, GenerationFilters};
use crate::session::{SessionHandle, SessionOutcome, StreamSession};
use crate::traits::{AnswerFallback, ConversationSink, Headers, HttpClient};

/// Reachability of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendStatus {
    pub online: bool,
    /// Round trip of the health request, when one completed.
    pub response_time_ms: Option<u64>,
}

/// A question whose answer is streaming on a background task.
pub struct PendingAnswer {
    pub question_id: String,
    pub answer_id: String,
    pub handle: SessionHandle,
}

/// Entry point for asking questions against one backend.
pub struct Assistant {
    config: ClientConfig,
    http: Arc<dyn HttpClient>,
    sink: Arc<dyn ConversationSink>,
    fallback: Arc<dyn AnswerFallback>,
}

impl Assistant {
    /// Build an assistant over the given client and transcript. The fallback
    /// re-requests through the same client.
    pub fn new(
        config: ClientConfig,
        http: Arc<dyn HttpClient>,
        sink: Arc<dyn ConversationSink>,
    ) -> Self {
        let fallback = Arc::new(PlainStreamFallback::new(Arc::clone(&http)));
        Self {
            config,
            http,
            sink,
            fallback,
        }
    }

    /// Production wiring: reqwest client and in-memory transcript.
    pub fn from_config(config: ClientConfig) -> Self {
        Self::new(
            config,
            Arc::new(ReqwestHttpClient::new()),
            Arc::new(InMemoryConversation::new()),
        )
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn AnswerFallback>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared transcript.
    pub fn conversation(&self) -> Arc<dyn ConversationSink> {
        Arc::clone(&self.sink)
    }

    /// Submit a question and start streaming its answer.
    ///
    /// Adds the question item and an empty streaming answer item
    /// (`{question_id}_answer`) before the request is sent.
    pub fn spawn_ask(
        &self,
        query: &str,
        filters: GenerationFilters,
    ) -> DataBrainResult<PendingAnswer> {
        let query = query.trim();
        let request = self.config.request(query, filters);
        request.validate().into_databrain()?;

        let question_id = Uuid::new_v4().to_string();
        let answer_id = format!("{}_answer", question_id);
        self.sink
            .push(ConversationItem::question(question_id.clone(), query));
        self.sink
            .push(ConversationItem::answer_placeholder(answer_id.clone()));

        let endpoint = self.config.generation_endpoint();
        tracing::info!("Asking {} (answer item {})", endpoint, answer_id);

        let handle = StreamSession::new(Arc::clone(&self.http), Arc::clone(&self.sink))
            .with_fallback(Arc::clone(&self.fallback))
            .spawn(endpoint, request, answer_id.clone());

        Ok(PendingAnswer {
            question_id,
            answer_id,
            handle,
        })
    }

    /// Submit a question and wait for its answer to finish.
    pub async fn ask(
        &self,
        query: &str,
        filters: GenerationFilters,
    ) -> DataBrainResult<SessionOutcome> {
        let pending = self.spawn_ask(query, filters)?;
        Ok(pending.handle.join().await)
    }

    /// Probe the health endpoint.
    pub async fn check_health(&self) -> BackendStatus {
        let url = self.config.health_url();
        let start = Instant::now();

        match self.http.get(&url, &Headers::new()).await {
            Ok(response) => {
                let status = BackendStatus {
                    online: response.is_success(),
                    response_time_ms: Some(start.elapsed().as_millis() as u64),
                };
                tracing::info!(
                    "Backend {} ({} mode)",
                    if status.online { "ONLINE" } else { "OFFLINE" },
                    if self.config.use_mocks { "mock" } else { "live" }
                );
                status
            }
            Err(e) => {
                tracing::warn!("Backend health check failed: {}", e);
                BackendStatus {
                    online: false,
                    response_time_ms: None,
                }
            }
        }
    }

    /// Open a reconnecting subscription using the configured backoff policy.
    pub fn subscribe(&self, url: &str) -> ReconnectingChannel {
        let mut channel = ReconnectingChannel::new(Arc::clone(&self.http), self.config.reconnect);
        channel.connect(url);
        channel
    }

    /// Remove every question and answer.
    pub fn clear(&self) {
        self.sink.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockFallback, MockHttpClient, MockResponse};
    use crate::error::{ConfigError, DataBrainError};
    use crate::models::Role;
    use crate::session::SessionStatus;
    use crate::traits::{HttpError, Response};
    use bytes::Bytes;

    fn assistant(http: &MockHttpClient) -> Assistant {
        Assistant::new(
            ClientConfig::default().with_api_base_url("http://backend.test"),
            Arc::new(http.clone()),
            Arc::new(InMemoryConversation::new()),
        )
    }

    #[tokio::test]
    async fn test_ask_creates_items_and_streams() {
        let http = MockHttpClient::new();
        http.set_response(
            "http://backend.test/api/v1/mock/generation/generate",
            MockResponse::Stream(vec![Bytes::from(
                "data: {\"type\":\"answer\",\"content\":\"Yes.\"}\ndata: [DONE]\n",
            )]),
        );
        let assistant = assistant(&http);

        let outcome = assistant
            .ask("  Is H2S monitoring required?  ", GenerationFilters::new())
            .await
            .unwrap();
        assert_eq!(outcome.status, SessionStatus::Completed);

        let items = assistant.conversation().items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].role, Role::Question);
        assert_eq!(items[0].content, "Is H2S monitoring required?");
        assert_eq!(items[1].id, format!("{}_answer", items[0].id));
        assert_eq!(items[1].content, "Yes.");
        assert!(!items[1].streaming);

        let body = http.get_requests()[0].body.clone().unwrap();
        assert!(body.contains("\"num_chunks\":5"));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let http = MockHttpClient::new();
        let assistant = assistant(&http);

        let err = assistant.ask("   ", GenerationFilters::new()).await.err();
        assert!(matches!(
            err,
            Some(DataBrainError::Config(ConfigError::InvalidRequest(_)))
        ));
        assert!(assistant.conversation().items().is_empty());
        assert!(http.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_custom_fallback_used_on_rejection() {
        let http = MockHttpClient::new();
        http.set_default_response(MockResponse::Error(HttpError::ServerError {
            status: 500,
            message: "down".to_string(),
        }));
        let fallback = MockFallback::with_chunks(["from fallback"]);
        let assistant = assistant(&http).with_fallback(Arc::new(fallback.clone()));

        let outcome = assistant.ask("q", GenerationFilters::new()).await.unwrap();
        assert_eq!(outcome.status, SessionStatus::Fallback);
        assert_eq!(outcome.answer, "from fallback");
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_check_health() {
        let http = MockHttpClient::new();
        http.set_response(
            "http://backend.test/api/v1/health/health",
            MockResponse::Success(Response::new(200, Bytes::from("{\"status\":\"ok\"}"))),
        );
        let status = assistant(&http).check_health().await;
        assert!(status.online);
        assert!(status.response_time_ms.is_some());

        let offline = MockHttpClient::new();
        offline.set_default_response(MockResponse::Error(HttpError::ConnectionFailed(
            "refused".to_string(),
        )));
        let status = assistant(&offline).check_health().await;
        assert_eq!(
            status,
            BackendStatus {
                online: false,
                response_time_ms: None
            }
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let http = MockHttpClient::new();
        let assistant = assistant(&http);
        assistant
            .conversation()
            .push(ConversationItem::question("1", "q"));
        assistant.clear();
        assert!(assistant.conversation().items().is_empty());
    }
}
