//! HTTP transport seam.
//!
//! The fetch unit only sees the [`Transport`] trait, so tests can drive the
//! retry state machine with scripted fakes instead of a real network.

mod libcurl;
#[cfg(test)]
pub(crate) mod fake;

pub use libcurl::{CurlTransport, HttpOptions};

use crate::retry::TransportError;
use std::io;
use std::time::Duration;

/// Longest rate-limit hint we are willing to honor.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Final response of one GET (after redirects).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u32,
    /// Parsed `Retry-After` header of the final response, if any.
    pub retry_after: Option<Duration>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Receives body chunks of a successful response.
pub type BodySink<'a> = dyn FnMut(&[u8]) -> io::Result<()> + 'a;

/// One HTTP GET per call.
///
/// Implementations must pass body chunks to `body` only when the final status
/// is 2xx. An error returned by `body` aborts the transfer and is reported as
/// [`TransportError::Sink`].
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, body: &mut BodySink<'_>) -> Result<Response, TransportError>;
}

/// Parse a `Retry-After` value given as delta-seconds.
///
/// HTTP-date values are not supported and yield `None`, which falls back to
/// plain exponential backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}
