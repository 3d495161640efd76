//! Unified error handling for the DataBrain client.
//!
//! - **Error Categories**: high-level classification for retry and messaging
//! - **Domain errors**: stream/channel errors and configuration errors
//! - **Unified Error Type**: `DataBrainError` wraps everything the crate can fail with
//! - **Result Type Alias**: `DataBrainResult<T>`
//!
//! Decoder-level problems (malformed JSON lines, unknown event types) never
//! reach this module: they are recovered inside [`crate::sse`].
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Connection, timeout, dropped stream | Yes |
//! | Server | 5xx, server closed stream | Yes |
//! | Client | 4xx, invalid payloads | No |
//! | User | Cancelled, refresh required | No |
//! | System | Local I/O | No |
//! | Configuration | Bad env values, invalid request | No |

mod category;
mod config;
mod databrain_error;
mod result;
mod stream;

pub use category::ErrorCategory;
pub use config::ConfigError;
pub use databrain_error::DataBrainError;
pub use result::{DataBrainResult, ResultExt};
pub use stream::StreamError;
