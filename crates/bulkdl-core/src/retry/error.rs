//! Transport error type for retry classification.

use super::classify::classify_curl_error;
use super::policy::ErrorKind;

/// Error returned by a single GET attempt.
///
/// Kept transport-agnostic so fake transports in tests can produce every
/// variant without going through libcurl.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connect or transfer timed out.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Connection refused, reset, or closed early.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The transport refused the URL itself.
    #[error("malformed URL: {0}")]
    MalformedUrl(String),
    /// Writing the response body to disk failed. Not retried.
    #[error("write failed: {0}")]
    Sink(#[source] std::io::Error),
    /// Any other transport failure (TLS, protocol errors, ...). Not retried.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Retry classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::Connection(_) => ErrorKind::Connection,
            TransportError::MalformedUrl(_)
            | TransportError::Sink(_)
            | TransportError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        if e.is_url_malformed() || e.is_unsupported_protocol() {
            return TransportError::MalformedUrl(e.to_string());
        }
        match classify_curl_error(&e) {
            ErrorKind::Timeout => TransportError::Timeout(e.to_string()),
            ErrorKind::Connection => TransportError::Connection(e.to_string()),
            _ => TransportError::Other(e.to_string()),
        }
    }
}
