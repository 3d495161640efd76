//! SSE line and payload parsing
//!
//! Stateless helpers shared by the answer-stream decoder, the fallback
//! retrieval and the reconnecting channel.

use serde_json::Value;

use crate::sse::events::{SseLine, SseParseError, StreamEvent, DONE_SENTINEL};
use crate::sse::payloads::{AnswerPayload, ContextsPayload};

/// Parse a single body line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return SseLine::Empty;
    }

    match line.strip_prefix("data:") {
        Some(rest) => SseLine::Data(rest.trim().to_string()),
        None => SseLine::Other(line.to_string()),
    }
}

/// Extract the payload of an event-bearing line, if it is one.
pub fn data_payload(line: &str) -> Option<String> {
    match parse_sse_line(line) {
        SseLine::Data(payload) => Some(payload),
        _ => None,
    }
}

/// True if the payload is the end-of-stream sentinel.
pub fn is_done_sentinel(payload: &str) -> bool {
    payload.trim() == DONE_SENTINEL
}

/// Parse a JSON payload into a typed event.
///
/// The `[DONE]` sentinel is not JSON; callers check [`is_done_sentinel`] first.
pub fn parse_payload(payload: &str) -> Result<StreamEvent, SseParseError> {
    let value: Value = serde_json::from_str(payload).map_err(|e| SseParseError::InvalidJson {
        event_type: "unknown".to_string(),
        source: e.to_string(),
    })?;
    parse_value(value)
}

/// Turn an already-parsed JSON value into a typed event, dispatching on `type`.
pub fn parse_value(value: Value) -> Result<StreamEvent, SseParseError> {
    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(SseParseError::MissingType)?
        .to_string();

    match event_type.as_str() {
        "answer" => {
            let payload: AnswerPayload =
                serde_json::from_value(value).map_err(|e| invalid(&event_type, e))?;
            Ok(StreamEvent::AnswerChunk {
                text: payload.content.unwrap_or_default(),
            })
        }
        "contexts" => {
            let payload: ContextsPayload =
                serde_json::from_value(value).map_err(|e| invalid(&event_type, e))?;
            Ok(StreamEvent::ContextBatch {
                query: payload.query.unwrap_or_default(),
                contexts: payload.contexts.unwrap_or_default(),
            })
        }
        _ => Err(SseParseError::UnknownEventType(event_type)),
    }
}

fn invalid(event_type: &str, err: serde_json::Error) -> SseParseError {
    SseParseError::InvalidJson {
        event_type: event_type.to_string(),
        source: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse_sse_line(""), SseLine::Empty);
        assert_eq!(parse_sse_line("\r"), SseLine::Empty);
        assert_eq!(parse_sse_line("   "), SseLine::Empty);
    }

    #[test]
    fn test_parse_data_line() {
        assert_eq!(
            parse_sse_line(r#"data: {"type":"answer"}"#),
            SseLine::Data(r#"{"type":"answer"}"#.to_string())
        );
        assert_eq!(
            parse_sse_line("data:[DONE]\r"),
            SseLine::Data("[DONE]".to_string())
        );
    }

    #[test]
    fn test_parse_other_lines() {
        assert_eq!(
            parse_sse_line(": keep-alive"),
            SseLine::Other(": keep-alive".to_string())
        );
        assert_eq!(
            parse_sse_line("event: message"),
            SseLine::Other("event: message".to_string())
        );
        assert!(data_payload("id: 4").is_none());
    }

    #[test]
    fn test_done_sentinel() {
        assert!(is_done_sentinel("[DONE]"));
        assert!(is_done_sentinel(" [DONE] "));
        assert!(!is_done_sentinel(r#"{"type":"done"}"#));
    }

    #[test]
    fn test_parse_answer_payload() {
        assert_eq!(
            parse_payload(r#"{"type":"answer","content":"Hello"}"#).unwrap(),
            StreamEvent::AnswerChunk {
                text: "Hello".to_string()
            }
        );
    }

    #[test]
    fn test_parse_answer_without_content_is_empty_chunk() {
        assert_eq!(
            parse_payload(r#"{"type":"answer"}"#).unwrap(),
            StreamEvent::AnswerChunk {
                text: String::new()
            }
        );
        assert_eq!(
            parse_payload(r#"{"type":"answer","content":null}"#).unwrap(),
            StreamEvent::AnswerChunk {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_parse_contexts_payload() {
        let event = parse_payload(
            r#"{"type":"contexts","query":"valves","contexts":[{"content":"a","score":0.9,"metadata":{}},{"content":"b","score":0.4,"metadata":{}}]}"#,
        )
        .unwrap();
        match event {
            StreamEvent::ContextBatch { query, contexts } => {
                assert_eq!(query, "valves");
                assert_eq!(contexts.len(), 2);
                assert_eq!(contexts[1].content, "b");
            }
            other => panic!("Expected ContextBatch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_payload("{bad json"),
            Err(SseParseError::InvalidJson { .. })
        ));
        assert_eq!(
            parse_payload(r#"{"content":"x"}"#),
            Err(SseParseError::MissingType)
        );
        assert_eq!(
            parse_payload(r#"{"type":"usage"}"#),
            Err(SseParseError::UnknownEventType("usage".to_string()))
        );
        assert!(matches!(
            parse_payload(r#"{"type":"answer","content":7}"#),
            Err(SseParseError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_context_with_null_score_keeps_batch() {
        let event = parse_payload(
            r#"{"type":"contexts","query":"q","contexts":[{"content":"a","score":0.9,"metadata":{}},{"content":"b","score":null,"metadata":{"relevance_score":null,"document_page_no":null}}]}"#,
        )
        .unwrap();
        match event {
            StreamEvent::ContextBatch { contexts, .. } => {
                assert_eq!(contexts.len(), 2);
                assert_eq!(contexts[0].score, 0.9);
                assert_eq!(contexts[1].score, 0.0);
                assert_eq!(contexts[1].metadata.relevance_score, None);
            }
            other => panic!("Expected ContextBatch, got {:?}", other),
        }
    }
}
