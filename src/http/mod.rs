//! HTTP client module with timeouts, opt-in retries and error classification.

mod client;
mod retry;

pub use client::{DEFAULT_REQUEST_TIMEOUT, HttpClient};
pub use retry::{NonRetryableError, RetryPolicy};
