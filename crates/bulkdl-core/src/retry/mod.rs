//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures) and exponential backoff decisions so the fetch unit
//! and the scheduler share a consistent policy.

mod classify;
mod error;
mod policy;

pub use classify::{classify_curl_error, classify_http_status};
pub use error::TransportError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy, MAX_JITTER};
