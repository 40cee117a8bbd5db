//! HTTP transport, retry policy, and wire message types.
//!
//! The transport issues the three protocol calls (submit POST, streaming
//! GET, cancel DELETE) through the retry wrapper and processes coordinator
//! responses into typed structures.

pub mod http;
pub mod messages;
pub mod response;
pub mod retry;

pub use http::HttpTransport;
pub use messages::{QueryHandle, StreamEvent};
pub use retry::{ExponentialBackoff, Jitter, RandomJitter, RetryPolicy};
