//! Scripted HTTP client for session and channel tests.
//!
//! Responses are looked up per URL. A queue of one-shot responses is
//! consulted before the standing response, which lets a test script a
//! subscription that fails a few times and then recovers.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

/// A request seen by the mock, kept for assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// GET or POST
    pub method: String,
    pub url: String,
    pub headers: Headers,
    /// Present for POST requests
    pub body: Option<String>,
}

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A complete, non-streamed response
    Success(Response),
    /// The request fails before any body is produced
    Error(HttpError),
    /// A streamed body that ends normally after the chunks
    Stream(Vec<Bytes>),
    /// A streamed body that yields the chunks and then fails
    StreamThenError(Vec<Bytes>, HttpError),
    /// A streamed body that yields the chunks and then never ends
    StreamThenHang(Vec<Bytes>),
}

#[derive(Debug, Default)]
struct Script {
    standing: HashMap<String, MockResponse>,
    queued: HashMap<String, VecDeque<MockResponse>>,
    fallback: Option<MockResponse>,
    requests: Vec<RecordedRequest>,
}

/// HTTP client returning scripted responses.
///
/// Clones share the same script, so a test can keep a handle for assertions
/// after moving the client into an `Arc<dyn HttpClient>`.
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    script: Arc<Mutex<Script>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer every request to `url` with `response`.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        self.script().standing.insert(url.to_string(), response);
    }

    /// Answer the next request to `url` with `response`, once.
    ///
    /// Queued responses are used in the order they were pushed and take
    /// precedence over the standing response.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        self.script()
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Answer requests to URLs without a configured response.
    pub fn set_default_response(&self, response: MockResponse) {
        self.script().fallback = Some(response);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.script().requests.clone()
    }

    /// Number of requests made to `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.script()
            .requests
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    pub fn clear_requests(&self) {
        self.script().requests.clear();
    }

    fn next_response(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: Option<&str>,
    ) -> Result<MockResponse, HttpError> {
        let mut script = self.script();
        script.requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body: body.map(str::to_string),
        });

        if let Some(response) = script.queued.get_mut(url).and_then(VecDeque::pop_front) {
            return Ok(response);
        }
        if let Some(response) = script.standing.get(url) {
            return Ok(response.clone());
        }
        script
            .fallback
            .clone()
            .ok_or_else(|| HttpError::Other(format!("No mock response for URL: {}", url)))
    }

    fn into_response(response: MockResponse) -> Result<Response, HttpError> {
        match response {
            MockResponse::Success(response) => Ok(response),
            MockResponse::Error(err) => Err(err),
            _ => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
        }
    }

    fn into_stream(response: MockResponse) -> Result<ByteStream, HttpError> {
        match response {
            MockResponse::Stream(chunks) => Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok)))),
            MockResponse::StreamThenError(chunks, err) => Ok(Box::pin(
                stream::iter(chunks.into_iter().map(Ok)).chain(stream::once(async move { Err(err) })),
            )),
            MockResponse::StreamThenHang(chunks) => Ok(Box::pin(
                stream::iter(chunks.into_iter().map(Ok)).chain(stream::pending()),
            )),
            MockResponse::Error(err) => Err(err),
            MockResponse::Success(response) if !response.is_success() => {
                Err(HttpError::ServerError {
                    status: response.status,
                    message: response.text().unwrap_or_default(),
                })
            }
            MockResponse::Success(_) => Err(HttpError::Other(
                "Non-stream response on stream request".to_string(),
            )),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::into_response(self.next_response("GET", url, headers, None)?)
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::into_response(self.next_response("POST", url, headers, Some(body))?)
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        Self::into_stream(self.next_response("POST", url, headers, Some(body))?)
    }

    async fn get_stream(&self, url: &str, headers: &Headers) -> Result<ByteStream, HttpError> {
        Self::into_stream(self.next_response("GET", url, headers, None)?)
    }
}
