//! Common test utilities for integration tests.
//!
//! ```ignore
//! mod common;
//! use common::*;
//!
//! let (http, sink) = live_client();
//! mount_sse_post(&server, GENERATE_PATH, sse_body(&[answer_line("hi"), done_line()])).await;
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use std::sync::Arc;

use databrain::adapters::{InMemoryConversation, ReqwestHttpClient};
use databrain::models::ConversationItem;
use databrain::traits::ConversationSink;

pub const GENERATE_PATH: &str = "/api/v1/generation/generate";
pub const MOCK_GENERATE_PATH: &str = "/api/v1/mock/generation/generate";
pub const HEALTH_PATH: &str = "/api/v1/health/health";

/// Real HTTP client plus an empty transcript.
pub fn live_client() -> (Arc<ReqwestHttpClient>, Arc<InMemoryConversation>) {
    (
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(InMemoryConversation::new()),
    )
}

/// Seed the transcript with a question and its streaming answer placeholder.
/// Returns the answer id.
pub fn seed_question(sink: &InMemoryConversation, question_id: &str, text: &str) -> String {
    let answer_id = format!("{}_answer", question_id);
    sink.push(ConversationItem::question(question_id, text));
    sink.push(ConversationItem::answer_placeholder(answer_id.clone()));
    answer_id
}
