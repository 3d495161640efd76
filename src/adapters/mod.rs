//! Concrete implementations of the trait abstractions in `crate::traits`.
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`InMemoryConversation`] - transcript store behind a mutex
//! - [`PlainStreamFallback`] - answer retrieval without typed event decoding
//!
//! The [`mock`] submodule provides test doubles.

pub mod fallback;
pub mod memory_sink;
pub mod mock;
pub mod reqwest_http;

pub use fallback::PlainStreamFallback;
pub use memory_sink::InMemoryConversation;
pub use mock::{MockFallback, MockHttpClient};
pub use reqwest_http::ReqwestHttpClient;
