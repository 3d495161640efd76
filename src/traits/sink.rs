//! Conversation store abstraction.
//!
//! The streaming session never owns conversation items. It addresses the
//! answer item by id and pushes keyed updates into a [`ConversationSink`].

use crate::models::{ConversationItem, ItemUpdate};

/// Store of visible question/answer turns.
///
/// Updates are keyed by item id, so writes for unrelated ids may interleave
/// in any order. Implementations use interior mutability; every method takes
/// `&self` so one sink can be shared by several sessions.
pub trait ConversationSink: Send + Sync {
    /// Append a new item to the transcript.
    fn push(&self, item: ConversationItem);

    /// Apply `update` to the item with `id`, creating an answer item if none exists.
    ///
    /// Returns `false` when the update was refused: question items never
    /// change, and answer items reject text or source changes once they are
    /// no longer streaming.
    fn upsert(&self, id: &str, update: ItemUpdate) -> bool;

    /// Snapshot of one item.
    fn get(&self, id: &str) -> Option<ConversationItem>;

    /// Snapshot of the whole transcript in insertion order.
    fn items(&self) -> Vec<ConversationItem>;

    /// Remove every item.
    fn clear(&self);
}
