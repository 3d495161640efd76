mod context;
mod conversation;
mod request;

pub use context::{ContextItem, ContextMetadata};
pub use conversation::{ConversationItem, ItemUpdate, Role};
pub use request::{GenerationFilters, GenerationRequest};
