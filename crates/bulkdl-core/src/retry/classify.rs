//! Map final HTTP statuses and libcurl failures onto [`ErrorKind`].

use crate::retry::policy::ErrorKind;

/// Statuses a server uses to ask us to slow down.
const THROTTLE_STATUSES: [u32; 2] = [429, 503];

/// libcurl failures that mean the connection broke rather than the request being wrong.
const CONNECTION_FAILURES: &[fn(&curl::Error) -> bool] = &[
    curl::Error::is_couldnt_connect,
    curl::Error::is_couldnt_resolve_host,
    curl::Error::is_couldnt_resolve_proxy,
    curl::Error::is_read_error,
    curl::Error::is_recv_error,
    curl::Error::is_send_error,
    curl::Error::is_got_nothing,
    curl::Error::is_partial_file,
];

/// Kind of a non-2xx final status. Only throttling and server errors are worth
/// another attempt; 4xx and stray 1xx/3xx are final.
pub fn classify_http_status(code: u32) -> ErrorKind {
    if THROTTLE_STATUSES.contains(&code) {
        ErrorKind::Throttled
    } else if (500..600).contains(&code) {
        ErrorKind::Http5xx(code as u16)
    } else {
        ErrorKind::Other
    }
}

/// Kind of a failed libcurl transfer.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        ErrorKind::Timeout
    } else if CONNECTION_FAILURES.iter().any(|is| is(e)) {
        ErrorKind::Connection
    } else {
        ErrorKind::Other
    }
}
