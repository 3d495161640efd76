//! reqwest-backed HTTP client.
//!
//! Production [`HttpClient`] used by the CLI. Streaming requests hand back
//! `reqwest`'s chunked body unchanged; line splitting happens in
//! [`crate::sse::LineBuffer`].

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

/// HTTP client over a shared `reqwest::Client`.
///
/// No request timeout is set by default because answer streams and
/// subscriptions stay open for as long as the server keeps writing.
///
/// # Example
///
/// ```ignore
/// use databrain::adapters::ReqwestHttpClient;
/// use databrain::traits::{HttpClient, Headers};
///
/// let client = ReqwestHttpClient::new();
/// let response = client.get("http://localhost:8008/api/v1/health/health", &Headers::new()).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured `reqwest::Client`, e.g. one with a connect timeout.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&str>,
        headers: &Headers,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }
        headers
            .iter()
            .fold(builder, |builder, (key, value)| builder.header(key, value))
    }

    /// Send and buffer the whole body. Any status is returned as a response.
    async fn send(builder: reqwest::RequestBuilder) -> Result<Response, HttpError> {
        let response = builder.send().await.map_err(send_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(body_error)?;

        Ok(Response::with_headers(status, headers, body))
    }

    /// Send and hand back the body as a byte stream.
    ///
    /// A non-2xx status is reported as [`HttpError::ServerError`] before any
    /// body bytes are read.
    async fn open_stream(builder: reqwest::RequestBuilder) -> Result<ByteStream, HttpError> {
        let response = builder.send().await.map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(HttpError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(body_error)),
        ))
    }
}

/// Failure before a response arrived.
fn send_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(err.to_string())
    } else if err.is_connect() {
        HttpError::ConnectionFailed(err.to_string())
    } else if err.is_builder() {
        HttpError::InvalidUrl(err.to_string())
    } else {
        HttpError::Other(err.to_string())
    }
}

/// Failure while reading an already-open body.
fn body_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(err.to_string())
    } else {
        HttpError::Io(err.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::send(self.request(reqwest::Method::GET, url, None, headers)).await
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        Self::send(self.request(reqwest::Method::POST, url, Some(body), headers)).await
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        Self::open_stream(self.request(reqwest::Method::POST, url, Some(body), headers)).await
    }

    async fn get_stream(&self, url: &str, headers: &Headers) -> Result<ByteStream, HttpError> {
        Self::open_stream(self.request(reqwest::Method::GET, url, None, headers)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::event_stream_headers;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        body
    }

    #[tokio::test]
    async fn test_get_returns_non_success_as_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/health/health"))
            .respond_with(ResponseTemplate::new(503).insert_header("x-state", "draining"))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let response = client
            .get(&format!("{}/api/v1/health/health", server.uri()), &Headers::new())
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        assert_eq!(response.headers.get("x-state"), Some(&"draining".to_string()));
    }

    #[tokio::test]
    async fn test_post_stream_sends_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("accept", "text/event-stream"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"query":"q"}"#))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let stream = client
            .post_stream(
                &format!("{}/generate", server.uri()),
                r#"{"query":"q"}"#,
                &event_stream_headers(),
            )
            .await
            .unwrap();
        assert_eq!(collect(stream).await, b"data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_stream_rejection_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let result = client
            .get_stream(&format!("{}/events", server.uri()), &Headers::new())
            .await;
        match result {
            Err(HttpError::ServerError { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            Err(other) => panic!("Expected ServerError, got {:?}", other),
            Ok(_) => panic!("Expected ServerError, got a stream"),
        }
    }

    #[tokio::test]
    async fn test_stream_rejection_without_body_uses_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let result = client
            .post_stream(&server.uri(), "{}", &Headers::new())
            .await;
        assert!(matches!(
            result,
            Err(HttpError::ServerError { status: 404, ref message }) if message == "Not Found"
        ));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let client = ReqwestHttpClient::new();
        let result = client
            .get_stream("http://127.0.0.1:59999/events", &Headers::new())
            .await;
        assert!(matches!(
            result,
            Err(HttpError::ConnectionFailed(_)) | Err(HttpError::Other(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let client = ReqwestHttpClient::new();
        let result = client.get("not-a-valid-url", &Headers::new()).await;
        assert!(result.is_err());
    }
}
