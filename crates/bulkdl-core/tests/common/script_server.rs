//! Minimal HTTP/1.1 server with scripted per-path responses for integration tests.
//!
//! Each path has a list of steps served in order; the last step repeats.
//! Unscripted paths get 404. Every request is counted per path.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Step {
    pub status: u16,
    /// `Retry-After` in seconds.
    pub retry_after: Option<u64>,
    pub body: Vec<u8>,
}

impl Step {
    pub fn ok(body: &[u8]) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.to_vec(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: format!("error {}", status).into_bytes(),
        }
    }

    pub fn throttled(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::status(429)
        }
    }
}

#[derive(Default)]
struct State {
    routes: HashMap<String, Vec<Step>>,
    hits: Mutex<HashMap<String, usize>>,
}

pub struct ScriptServer {
    base: String,
    state: Arc<State>,
}

impl ScriptServer {
    /// Starts a server in a background thread. Runs until the process exits.
    pub fn start(routes: Vec<(&str, Vec<Step>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State {
            routes: routes
                .into_iter()
                .map(|(path, steps)| (path.to_string(), steps))
                .collect(),
            hits: Mutex::new(HashMap::new()),
        });
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    /// Full URL for `path` (which starts with '/').
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }
}

fn handle(mut stream: TcpStream, state: &State) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let Some(path) = request_path(request) else {
        return;
    };

    let hit = {
        let mut hits = state.hits.lock().unwrap();
        let c = hits.entry(path.to_string()).or_insert(0);
        *c += 1;
        *c
    };
    let step = match state.routes.get(path) {
        Some(steps) if !steps.is_empty() => steps[(hit - 1).min(steps.len() - 1)].clone(),
        _ => Step::status(404),
    };

    let retry_after = step
        .retry_after
        .map(|s| format!("Retry-After: {}\r\n", s))
        .unwrap_or_default();
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        step.status,
        reason(step.status),
        step.body.len(),
        retry_after
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&step.body);
}

/// Path (with query) of a `GET` request line.
fn request_path(request: &str) -> Option<&str> {
    let mut parts = request.lines().next()?.split_whitespace();
    let method = parts.next()?;
    if !method.eq_ignore_ascii_case("GET") {
        return None;
    }
    parts.next()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
