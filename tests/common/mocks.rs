//! Wire-format fixtures and wiremock helpers.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `data:` line carrying an answer fragment.
pub fn answer_line(text: &str) -> String {
    format!(
        "data: {}",
        serde_json::json!({ "type": "answer", "content": text })
    )
}

/// `data:` line carrying `n` retrieved passages.
pub fn contexts_line(query: &str, n: usize) -> String {
    let contexts: Vec<_> = (0..n)
        .map(|i| {
            serde_json::json!({
                "content": format!("passage {}", i),
                "score": 0.9 - (i as f64) * 0.1,
                "metadata": {
                    "document_name": format!("manual-{}.pdf", i),
                    "document_page_no": i + 1,
                    "relevance_score": 0.5
                }
            })
        })
        .collect();
    format!(
        "data: {}",
        serde_json::json!({ "type": "contexts", "query": query, "contexts": contexts })
    )
}

pub fn done_line() -> String {
    "data: [DONE]".to_string()
}

/// Join lines into an event-stream body, one event per blank-line block.
pub fn sse_body<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|l| format!("{}\n\n", l.as_ref()))
        .collect()
}

/// Event-stream response with the given body.
pub fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

/// Serve `body` as an event stream for POSTs to `route`.
pub async fn mount_sse_post(server: &MockServer, route: &str, body: String) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(sse_response(body))
        .mount(server)
        .await;
}
