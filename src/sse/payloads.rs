//! SSE payload deserialization structs
//!
//! Internal structs for the JSON objects carried on `data:` lines.

use serde::Deserialize;

use crate::models::ContextItem;

/// `{"type": "answer", "content": "..."}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnswerPayload {
    /// Missing or null content is treated as the empty end-of-answer chunk
    #[serde(default)]
    pub content: Option<String>,
}

/// `{"type": "contexts", "query": "...", "contexts": [...]}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContextsPayload {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub contexts: Option<Vec<ContextItem>>,
}
