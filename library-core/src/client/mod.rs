//! Outbound HTTP helpers: retry with backoff and a bounded request queue.
pub mod queue;
pub mod retry;

pub use queue::RequestQueue;
pub use retry::{is_retryable_status, retry_request, RetryConfig};
