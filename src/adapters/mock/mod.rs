//! Test doubles for the trait seams.
//!
//! - [`MockHttpClient`] - scripted HTTP responses and streamed bodies
//! - [`MockFallback`] - canned fallback answers with a call counter

pub mod fallback;
pub mod http;

pub use fallback::MockFallback;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
