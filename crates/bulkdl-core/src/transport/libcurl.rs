//! libcurl-backed transport: one easy handle per GET.

use std::cell::Cell;
use std::str;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::retry::TransportError;

use super::{parse_retry_after, BodySink, Response, Transport};

/// Timeouts applied to every transfer.
#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    /// Abort if throughput stays below 1 KiB/s for this long.
    pub low_speed_time: Duration,
    /// Hard cap so a completely stuck transfer eventually fails.
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        HttpConfig::default().into()
    }
}

impl From<HttpConfig> for HttpOptions {
    fn from(cfg: HttpConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

/// [`Transport`] over the `curl` crate. Blocking; run it off the async runtime.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: HttpOptions,
}

impl CurlTransport {
    pub fn new(options: HttpOptions) -> Self {
        Self { options }
    }
}

impl Transport for CurlTransport {
    fn get(&self, url: &str, body: &mut BodySink<'_>) -> Result<Response, TransportError> {
        let status = Cell::new(0u32);
        let retry_after: Cell<Option<Duration>> = Cell::new(None);
        let mut sink_error: Option<std::io::Error> = None;

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.useragent(concat!("bulkdl/", env!("CARGO_PKG_VERSION")))?;
        easy.connect_timeout(self.options.connect_timeout)?;
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(self.options.low_speed_time)?;
        easy.timeout(self.options.timeout)?;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                let Ok(line) = str::from_utf8(data) else {
                    return true;
                };
                let line = line.trim_end();
                if line.starts_with("HTTP/") {
                    // A new status line starts a new response (redirect hop).
                    let code = line
                        .split_whitespace()
                        .nth(1)
                        .and_then(|c| c.parse().ok())
                        .unwrap_or(0);
                    status.set(code);
                    retry_after.set(None);
                } else if let Some((name, value)) = line.split_once(':') {
                    if name.trim().eq_ignore_ascii_case("retry-after") {
                        retry_after.set(parse_retry_after(value));
                    }
                }
                true
            })?;
            transfer.write_function(|data| {
                if !(200..300).contains(&status.get()) {
                    return Ok(data.len());
                }
                match body(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        sink_error = Some(e);
                        Ok(0) // abort transfer
                    }
                }
            })?;
            let result = transfer.perform();
            result
        };

        if let Err(e) = performed {
            if e.is_write_error() {
                if let Some(io_err) = sink_error.take() {
                    return Err(TransportError::Sink(io_err));
                }
            }
            return Err(e.into());
        }

        let code = easy.response_code()?;
        Ok(Response {
            status: code,
            retry_after: retry_after.get(),
        })
    }
}
