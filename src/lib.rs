//! DataBrain client - streaming answers from a retrieval-augmented backend
//!
//! Decodes the SSE answer stream, keeps a conversation transcript in sync
//! while an answer streams, and maintains a reconnecting server event
//! subscription. The library modules are exposed for the CLI and for
//! integration tests.

pub mod adapters;
pub mod assistant;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod sse;
pub mod traits;
