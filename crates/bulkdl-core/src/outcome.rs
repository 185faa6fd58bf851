//! Work items, per-attempt results and terminal download outcomes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::url_model::MapError;

/// One URL paired with its resolved destination. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    url: String,
    destination: PathBuf,
}

impl WorkItem {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Why a URL ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// Non-success HTTP status of the final response.
    #[error("HTTP {0}")]
    Http(u32),
    /// Timeout or connection failure.
    #[error("{0}")]
    Transport(String),
    #[error("malformed URL: {0}")]
    MalformedUrl(String),
    #[error("invalid destination path: {0}")]
    InvalidPath(String),
    /// Destination path shared with (or nested under) another URL's destination.
    #[error("destination collides with {0}")]
    Collision(String),
    /// Disk write, sync or rename failed.
    #[error("filesystem: {0}")]
    Filesystem(String),
    /// The fetch unit crashed; nothing is known about the transfer.
    #[error("internal error: {0}")]
    Internal(String),
    /// Stop requested before this URL could finish.
    #[error("cancelled")]
    Cancelled,
}

impl From<MapError> for FailureReason {
    fn from(e: MapError) -> Self {
        match e {
            MapError::MalformedUrl { .. } => FailureReason::MalformedUrl(e.to_string()),
            MapError::InvalidPath { .. } => FailureReason::InvalidPath(e.to_string()),
        }
    }
}

/// Classification of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptKind {
    Success,
    RetryableFailure(FailureReason),
    FatalFailure(FailureReason),
}

/// Record of one GET attempt inside a fetch unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    /// 1-based attempt number.
    pub attempt: u32,
    pub kind: AttemptKind,
    pub elapsed: Duration,
    /// Server-supplied minimum wait (Retry-After).
    pub rate_limit_hint: Option<Duration>,
    /// Wait taken after this attempt before the next one.
    pub backoff: Option<Duration>,
}

/// Why a URL was skipped without downloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DryRun,
    /// Destination already exists and overwrite is off.
    AlreadyExists,
}

/// Terminal state of one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeState {
    Downloaded { bytes: u64 },
    Skipped(SkipReason),
    Failed { reason: FailureReason, attempts: u32 },
}

/// Result for one URL, emitted exactly once.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub url: String,
    /// `None` only when the URL was rejected before a path could be resolved.
    pub destination: Option<PathBuf>,
    pub state: OutcomeState,
    /// GET attempts made (0 for skipped or rejected URLs).
    pub attempts: u32,
    pub elapsed: Duration,
    pub history: Vec<AttemptResult>,
}

impl DownloadOutcome {
    /// Outcome for a URL failed before any attempt (rejected path, collision).
    pub fn rejected(url: impl Into<String>, destination: Option<PathBuf>, reason: FailureReason) -> Self {
        Self {
            url: url.into(),
            destination,
            state: OutcomeState::Failed {
                reason,
                attempts: 0,
            },
            attempts: 0,
            elapsed: Duration::ZERO,
            history: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, OutcomeState::Failed { .. })
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match &self.state {
            OutcomeState::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
