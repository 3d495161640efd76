//! In-process conversation store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{ConversationItem, ItemUpdate};
use crate::traits::ConversationSink;

/// Transcript held in memory, shared behind an `Arc` by the CLI and sessions.
#[derive(Debug, Default)]
pub struct InMemoryConversation {
    items: Mutex<Vec<ConversationItem>>,
}

impl InMemoryConversation {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConversationItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl ConversationSink for InMemoryConversation {
    fn push(&self, item: ConversationItem) {
        self.lock().push(item);
    }

    fn upsert(&self, id: &str, update: ItemUpdate) -> bool {
        let mut items = self.lock();

        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            let mut item = ConversationItem::answer_placeholder(id);
            item.apply(&update);
            items.push(item);
            return true;
        };

        if item.is_question() {
            tracing::warn!("Refusing update to question item {}", id);
            return false;
        }
        if !item.streaming && update.touches_payload() {
            tracing::debug!("Refusing update to finalized answer {}", id);
            return false;
        }
        item.apply(&update);
        true
    }

    fn get(&self, id: &str) -> Option<ConversationItem> {
        self.lock().iter().find(|item| item.id == id).cloned()
    }

    fn items(&self) -> Vec<ConversationItem> {
        self.lock().clone()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
