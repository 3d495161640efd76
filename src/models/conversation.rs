//! Visible transcript turns and the keyed updates applied to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::ContextItem;

/// Which side of the exchange a turn belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Question,
    Answer,
}

/// A turn in the visible transcript.
///
/// Question items never change after creation. Answer items are mutated in
/// place while `streaming` is true and frozen once it flips to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<ContextItem>>,
}

impl ConversationItem {
    /// Create a question turn.
    pub fn question(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Question,
            content: content.into(),
            timestamp: Utc::now(),
            streaming: false,
            contexts: None,
        }
    }

    /// Create the empty, streaming answer placeholder paired with a question.
    pub fn answer_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Answer,
            content: String::new(),
            timestamp: Utc::now(),
            streaming: true,
            contexts: None,
        }
    }

    pub fn is_question(&self) -> bool {
        self.role == Role::Question
    }

    /// Apply an update in place.
    pub fn apply(&mut self, update: &ItemUpdate) {
        if let Some(content) = &update.content {
            self.content = content.clone();
        }
        if let Some(contexts) = &update.contexts {
            self.contexts = Some(contexts.clone());
        }
        if let Some(streaming) = update.streaming {
            self.streaming = streaming;
        }
    }
}

/// Partial update addressed to one conversation item by id.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub content: Option<String>,
    pub streaming: Option<bool>,
    pub contexts: Option<Vec<ContextItem>>,
}

impl ItemUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = Some(streaming);
        self
    }

    pub fn contexts(mut self, contexts: Vec<ContextItem>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    /// True if the update would change text or sources, not just the flag.
    pub fn touches_payload(&self) -> bool {
        self.content.is_some() || self.contexts.is_some()
    }
}
