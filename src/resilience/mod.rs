//! Transport-level retry.
//!
//! The upload engine never retries on its own; transient network failures
//! and 5xx responses are absorbed here, below the service layer.

mod retry;

pub use retry::{RetryConfig, RetryPolicy, RetryingTransport};
