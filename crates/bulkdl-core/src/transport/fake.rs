//! Scripted in-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::retry::TransportError;

use super::{BodySink, Response, Transport};

/// One scripted reply.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Status {
        status: u32,
        retry_after: Option<Duration>,
        body: Vec<u8>,
    },
    Timeout,
    /// Sends `body` then drops the connection.
    ResetAfter(Vec<u8>),
    /// Panics inside `get`, standing in for a bug below the fetch unit.
    Panic,
}

impl Reply {
    pub(crate) fn ok(body: &[u8]) -> Self {
        Reply::Status {
            status: 200,
            retry_after: None,
            body: body.to_vec(),
        }
    }

    pub(crate) fn status(status: u32) -> Self {
        Reply::Status {
            status,
            retry_after: None,
            body: Vec::new(),
        }
    }
}

/// Replies per URL in order; the last reply repeats once the script runs out.
/// URLs without a script get `200` with the URL as body.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Vec<Reply>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(crate) fn script(self, url: &str, replies: Vec<Reply>) -> Self {
        self.scripts.lock().unwrap().insert(url.to_string(), replies);
        self
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> Reply {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let c = calls.entry(url.to_string()).or_insert(0);
            *c += 1;
            *c
        };
        let scripts = self.scripts.lock().unwrap();
        match scripts.get(url) {
            Some(replies) if !replies.is_empty() => {
                replies[(n - 1).min(replies.len() - 1)].clone()
            }
            _ => Reply::ok(url.as_bytes()),
        }
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str, body: &mut BodySink<'_>) -> Result<Response, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let reply = self.next_reply(url);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Status {
                status,
                retry_after,
                body: data,
            } => {
                if (200..300).contains(&status) {
                    for chunk in data.chunks(4) {
                        body(chunk).map_err(TransportError::Sink)?;
                    }
                }
                Ok(Response {
                    status,
                    retry_after,
                })
            }
            Reply::Timeout => Err(TransportError::Timeout("scripted timeout".to_string())),
            Reply::ResetAfter(data) => {
                body(&data).map_err(TransportError::Sink)?;
                Err(TransportError::Connection("connection reset".to_string()))
            }
            Reply::Panic => panic!("scripted transport panic for {}", url),
        }
    }
}
