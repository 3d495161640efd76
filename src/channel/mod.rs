//! Self-healing server-initiated event subscription.
//!
//! [`ReconnectingChannel`] keeps a GET event stream open on a background
//! task. Connection bookkeeping lives in the pure [`ChannelMachine`]; the
//! task only performs I/O and sleeps for the backoff delays it is told to.
//! Observers follow state through a `watch` receiver and take accepted
//! events from [`ReconnectingChannel::recv`].

mod machine;
mod policy;

pub use machine::{
    ChannelAction, ChannelErrorKind, ChannelMachine, ChannelSnapshot, ChannelState, MSG_CLOSED,
    MSG_LOST, MSG_PARSE_FAILED, MSG_RECONNECTING, MSG_RETRYING,
};
pub use policy::ReconnectPolicy;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sse::{data_payload, LineBuffer, StreamEvent};
use crate::traits::{Headers, HttpClient};

/// State shared between the channel handle and its worker task.
struct Shared {
    machine: Mutex<ChannelMachine>,
    state_tx: watch::Sender<ChannelSnapshot>,
    /// Events tagged with the generation of the worker that accepted them.
    event_tx: mpsc::UnboundedSender<(u64, StreamEvent)>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ChannelMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the machine and publish the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut ChannelMachine) -> R) -> R {
        let mut machine = self.lock();
        let result = f(&mut machine);
        self.state_tx.send_replace(machine.snapshot());
        result
    }

    /// Like [`Shared::update`], but only while `generation` is current.
    fn update_current<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut ChannelMachine) -> R,
    ) -> Option<R> {
        let mut machine = self.lock();
        if machine.generation() != generation {
            return None;
        }
        let result = f(&mut machine);
        self.state_tx.send_replace(machine.snapshot());
        Some(result)
    }
}

/// Long-lived subscription that reconnects with exponential backoff.
pub struct ReconnectingChannel {
    http: Arc<dyn HttpClient>,
    shared: Arc<Shared>,
    event_rx: mpsc::UnboundedReceiver<(u64, StreamEvent)>,
    state_rx: watch::Receiver<ChannelSnapshot>,
    worker: Option<JoinHandle<()>>,
}

impl ReconnectingChannel {
    pub fn new(http: Arc<dyn HttpClient>, policy: ReconnectPolicy) -> Self {
        let machine = ChannelMachine::new(policy);
        let (state_tx, state_rx) = watch::channel(machine.snapshot());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            http,
            shared: Arc::new(Shared {
                machine: Mutex::new(machine),
                state_tx,
                event_tx,
            }),
            event_rx,
            state_rx,
            worker: None,
        }
    }

    /// Tear down any existing subscription and open one to `url`.
    ///
    /// Accumulated messages and errors are discarded.
    pub fn connect(&mut self, url: impl Into<String>) {
        self.stop_worker();
        self.discard_pending();
        let url = url.into();
        let generation = self.shared.update(|m| m.connect(url.clone()));
        self.spawn_worker(generation, url);
    }

    /// Reconnect to the last url with a fresh attempt budget.
    ///
    /// Works after the automatic budget ran out. Returns `false` when there
    /// is no url to reconnect to.
    pub fn retry(&mut self) -> bool {
        self.stop_worker();
        self.discard_pending();
        let restarted = self
            .shared
            .update(|m| m.retry().map(|url| (m.generation(), url)));
        match restarted {
            Some((generation, url)) => {
                self.spawn_worker(generation, url);
                true
            }
            None => false,
        }
    }

    /// Cancel any pending reconnect and close the connection. Idempotent.
    pub fn disconnect(&mut self) {
        self.stop_worker();
        self.discard_pending();
        self.shared.update(ChannelMachine::disconnect);
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ChannelSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn state(&self) -> ChannelState {
        self.state_rx.borrow().state
    }

    /// Receiver notified on every state or error change.
    pub fn subscribe(&self) -> watch::Receiver<ChannelSnapshot> {
        self.state_rx.clone()
    }

    /// Every event accepted since the last `connect` or `retry`.
    pub fn messages(&self) -> Vec<StreamEvent> {
        self.shared.lock().messages().to_vec()
    }

    /// Next accepted event of the current subscription, in arrival order.
    ///
    /// Events from a subscription replaced by `connect`, `retry` or
    /// `disconnect` are never returned.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        loop {
            let (generation, event) = self.event_rx.recv().await?;
            if generation == self.shared.lock().generation() {
                return Some(event);
            }
        }
    }

    fn discard_pending(&mut self) {
        while self.event_rx.try_recv().is_ok() {}
    }

    fn spawn_worker(&mut self, generation: u64, url: String) {
        let http = Arc::clone(&self.http);
        let shared = Arc::clone(&self.shared);
        self.worker = Some(tokio::spawn(async move {
            run_subscription(http, shared, generation, url).await;
        }));
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for ReconnectingChannel {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

/// Open, read, and reopen the subscription until the machine says stop or
/// the generation moves on.
async fn run_subscription(
    http: Arc<dyn HttpClient>,
    shared: Arc<Shared>,
    generation: u64,
    mut url: String,
) {
    let mut headers = Headers::new();
    headers.insert("Accept".to_string(), "text/event-stream".to_string());

    loop {
        let kind = match http.get_stream(&url, &headers).await {
            Ok(mut body) => {
                if shared.update_current(generation, ChannelMachine::on_open).is_none() {
                    return;
                }
                info!("Subscribed to {}", url);

                let mut lines = LineBuffer::new();
                loop {
                    match body.next().await {
                        Some(Ok(chunk)) => {
                            for line in lines.push(&chunk) {
                                if !deliver(&shared, generation, &line) {
                                    return;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Subscription stream failed: {}", e);
                            break ChannelErrorKind::Failed;
                        }
                        None => {
                            if let Some(line) = lines.finish() {
                                if !deliver(&shared, generation, &line) {
                                    return;
                                }
                            }
                            break ChannelErrorKind::Closed;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Failed to open subscription to {}: {}", url, e);
                ChannelErrorKind::Failed
            }
        };

        let action = shared.update_current(generation, |m| m.on_error(kind));
        match action {
            Some(ChannelAction::ScheduleReconnect { attempt, delay }) => {
                debug!("Reconnect attempt {} scheduled in {:?}", attempt, delay);
                tokio::time::sleep(delay).await;
                match shared.update_current(generation, ChannelMachine::begin_reconnect) {
                    Some(Some(next)) => url = next,
                    _ => return,
                }
            }
            Some(ChannelAction::Stop) | Some(ChannelAction::None) | None => return,
        }
    }
}

/// Feed one body line to the machine and forward an accepted event.
///
/// Returns `false` once this worker is stale.
fn deliver(shared: &Shared, generation: u64, line: &str) -> bool {
    let Some(payload) = data_payload(line) else {
        return true;
    };
    match shared.update_current(generation, |m| m.on_message(&payload)) {
        Some(Some(event)) => {
            let _ = shared.event_tx.send((generation, event));
            true
        }
        Some(None) => true,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::traits::HttpError;
    use bytes::Bytes;
    use std::time::Duration;

    const URL: &str = "http://backend.test/api/v1/events";

    fn channel(http: &MockHttpClient) -> ReconnectingChannel {
        ReconnectingChannel::new(Arc::new(http.clone()), ReconnectPolicy::default())
    }

    async fn wait_for(
        rx: &mut watch::Receiver<ChannelSnapshot>,
        pred: impl Fn(&ChannelSnapshot) -> bool,
    ) -> ChannelSnapshot {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if pred(&snapshot) {
                    return snapshot.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_then_terminal_error() {
        let http = MockHttpClient::new();
        http.set_response(
            URL,
            MockResponse::Error(HttpError::ConnectionFailed("refused".to_string())),
        );
        let mut channel = channel(&http);
        let mut rx = channel.subscribe();

        let started = tokio::time::Instant::now();
        channel.connect(URL);
        let snapshot = wait_for(&mut rx, |s| s.state == ChannelState::ClosedError).await;

        assert_eq!(snapshot.error.as_deref(), Some(MSG_LOST));
        assert_eq!(http.request_count(URL), 4);
        // 1s + 2s + 4s of backoff
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(7), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(8), "elapsed {:?}", elapsed);

        // nothing else is scheduled
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(http.request_count(URL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_forwarded_and_recorded() {
        let http = MockHttpClient::new();
        http.set_response(
            URL,
            MockResponse::StreamThenHang(vec![
                Bytes::from("data: {\"type\":\"answer\",\"content\":\"one\"}\n"),
                Bytes::from("data: \n: ping\ndata: {\"kind\":\"x\"}\n"),
                Bytes::from("data: {\"type\":\"contexts\",\"query\":\"q\",\"contexts\":[]}\n"),
            ]),
        );
        let mut channel = channel(&http);
        channel.connect(URL);

        assert_eq!(
            channel.recv().await,
            Some(StreamEvent::AnswerChunk {
                text: "one".to_string()
            })
        );
        assert!(matches!(
            channel.recv().await,
            Some(StreamEvent::ContextBatch { .. })
        ));
        assert_eq!(channel.messages().len(), 2);
        assert_eq!(channel.state(), ChannelState::Open);
        assert_eq!(channel.snapshot().message_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_is_terminal() {
        let http = MockHttpClient::new();
        http.set_response(
            URL,
            MockResponse::Stream(vec![Bytes::from(
                "data: {\"type\":\"answer\",\"content\":\"bye\"}\n",
            )]),
        );
        let mut channel = channel(&http);
        let mut rx = channel.subscribe();
        channel.connect(URL);

        let snapshot = wait_for(&mut rx, |s| s.state == ChannelState::ClosedError).await;
        assert_eq!(snapshot.error.as_deref(), Some(MSG_CLOSED));
        assert_eq!(snapshot.message_count, 1);
        assert_eq!(http.request_count(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let http = MockHttpClient::new();
        http.push_response(
            URL,
            MockResponse::StreamThenError(
                vec![Bytes::from("data: {\"type\":\"answer\",\"content\":\"a\"}\n")],
                HttpError::Io("reset".to_string()),
            ),
        );
        http.set_response(
            URL,
            MockResponse::StreamThenHang(vec![Bytes::from(
                "data: {\"type\":\"answer\",\"content\":\"b\"}\n",
            )]),
        );
        let mut channel = channel(&http);
        channel.connect(URL);

        assert!(channel.recv().await.is_some());
        assert!(channel.recv().await.is_some());

        let snapshot = channel.snapshot();
        assert_eq!(snapshot.state, ChannelState::Open);
        assert_eq!(snapshot.attempts, 0);
        assert_eq!(snapshot.message_count, 2);
        assert_eq!(http.request_count(URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_exhaustion() {
        let http = MockHttpClient::new();
        for _ in 0..4 {
            http.push_response(
                URL,
                MockResponse::Error(HttpError::ConnectionFailed("refused".to_string())),
            );
        }
        http.set_response(URL, MockResponse::StreamThenHang(Vec::new()));
        let mut channel = channel(&http);
        let mut rx = channel.subscribe();

        channel.connect(URL);
        wait_for(&mut rx, |s| s.state == ChannelState::ClosedError).await;

        assert!(channel.retry());
        let snapshot = wait_for(&mut rx, |s| s.state == ChannelState::Open).await;
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let http = MockHttpClient::new();
        http.set_response(
            URL,
            MockResponse::Error(HttpError::ConnectionFailed("refused".to_string())),
        );
        let mut channel = channel(&http);
        let mut rx = channel.subscribe();

        channel.connect(URL);
        wait_for(&mut rx, |s| s.state == ChannelState::Reconnecting).await;

        channel.disconnect();
        channel.disconnect();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(http.request_count(URL), 1);
        let snapshot = channel.snapshot();
        assert_eq!(snapshot.state, ChannelState::Idle);
        assert_eq!(snapshot.url, None);
        assert!(!channel.retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_discards_events_of_previous_subscription() {
        const OTHER_URL: &str = "http://backend.test/api/v1/other-events";
        let http = MockHttpClient::new();
        http.set_response(
            URL,
            MockResponse::StreamThenHang(vec![Bytes::from(
                "data: {\"type\":\"answer\",\"content\":\"OLD\"}\n",
            )]),
        );
        http.set_response(
            OTHER_URL,
            MockResponse::StreamThenHang(vec![Bytes::from(
                "data: {\"type\":\"answer\",\"content\":\"NEW\"}\n",
            )]),
        );
        let mut channel = channel(&http);
        let mut rx = channel.subscribe();

        channel.connect(URL);
        wait_for(&mut rx, |s| s.message_count == 1).await;

        channel.connect(OTHER_URL);
        assert_eq!(
            channel.recv().await,
            Some(StreamEvent::AnswerChunk {
                text: "NEW".to_string()
            })
        );
        assert_eq!(
            channel.messages(),
            vec![StreamEvent::AnswerChunk {
                text: "NEW".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_discards_unread_events() {
        let http = MockHttpClient::new();
        http.push_response(
            URL,
            MockResponse::StreamThenHang(vec![Bytes::from(
                "data: {\"type\":\"answer\",\"content\":\"first\"}\n",
            )]),
        );
        http.set_response(
            URL,
            MockResponse::StreamThenHang(vec![Bytes::from(
                "data: {\"type\":\"answer\",\"content\":\"second\"}\n",
            )]),
        );
        let mut channel = channel(&http);
        let mut rx = channel.subscribe();

        channel.connect(URL);
        wait_for(&mut rx, |s| s.message_count == 1).await;

        assert!(channel.retry());
        assert_eq!(
            channel.recv().await,
            Some(StreamEvent::AnswerChunk {
                text: "second".to_string()
            })
        );
    }
}
