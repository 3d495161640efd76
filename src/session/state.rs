//! Accumulation state for one question/answer exchange.
//!
//! [`SessionState`] is a pure fold over [`StreamEvent`]s. It decides what to
//! write to the conversation item but never writes itself, so every
//! transition can be tested without a transport.

use crate::models::{ContextItem, ItemUpdate};
use crate::sse::StreamEvent;

/// What the session should do after folding one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Fold {
    /// Write this update and keep reading.
    Update(ItemUpdate),
    /// Write this final update and stop reading.
    Finalize(ItemUpdate),
    /// Nothing to write.
    Ignored,
}

/// Answer text and sources accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    answer: String,
    contexts: Vec<ContextItem>,
    events_received: usize,
    finalized: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn contexts(&self) -> &[ContextItem] {
        &self.contexts
    }

    /// Number of decoded events applied, including context batches.
    pub fn events_received(&self) -> usize {
        self.events_received
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Fold one decoded event. Events after finalization are ignored.
    pub fn apply(&mut self, event: &StreamEvent) -> Fold {
        if self.finalized {
            return Fold::Ignored;
        }
        self.events_received += 1;

        match event {
            StreamEvent::AnswerChunk { text } if !text.is_empty() => self.append(text),
            StreamEvent::AnswerChunk { .. } | StreamEvent::Done => match self.finalize() {
                Some(update) => Fold::Finalize(update),
                None => Fold::Ignored,
            },
            StreamEvent::ContextBatch { contexts, .. } => {
                self.contexts = contexts.clone();
                Fold::Update(
                    ItemUpdate::new()
                        .contexts(self.contexts.clone())
                        .streaming(true),
                )
            }
        }
    }

    /// Fold a plain text fragment from the fallback retrieval.
    pub fn apply_text(&mut self, text: &str) -> Fold {
        if self.finalized || text.is_empty() {
            return Fold::Ignored;
        }
        self.append(text)
    }

    fn append(&mut self, text: &str) -> Fold {
        self.answer.push_str(text);
        Fold::Update(
            ItemUpdate::new()
                .content(self.answer.clone())
                .streaming(true),
        )
    }

    /// Mark the exchange finished, keeping the text and sources gathered.
    ///
    /// Returns `None` when already finalized, so racing end signals produce a
    /// single write.
    pub fn finalize(&mut self) -> Option<ItemUpdate> {
        if self.finalized {
            return None;
        }
        self.finalized = true;

        let mut update = ItemUpdate::new().content(self.answer.clone()).streaming(false);
        if !self.contexts.is_empty() {
            update = update.contexts(self.contexts.clone());
        }
        Some(update)
    }

    /// Finalize with an error note.
    ///
    /// The note replaces empty content and is appended after a blank line
    /// otherwise. Returns `None` when already finalized.
    pub fn fail(&mut self, message: &str) -> Option<ItemUpdate> {
        if self.finalized {
            return None;
        }
        self.finalized = true;

        let content = if self.answer.is_empty() {
            format!("Error: {}", message)
        } else {
            format!("{}\n\nError: {}", self.answer, message)
        };
        Some(ItemUpdate::new().content(content).streaming(false))
    }
}
