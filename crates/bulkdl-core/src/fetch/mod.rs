//! Per-URL fetch unit: an explicit retry/backoff state machine.
//!
//! `Pending → Attempting → {Succeeded, WaitingBackoff, Failed}`, with
//! `WaitingBackoff → Attempting` once the wait expires. Blocking; the
//! scheduler runs each unit on a blocking task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RunConfig;
use crate::control::StopSignal;
use crate::outcome::{
    AttemptKind, AttemptResult, DownloadOutcome, FailureReason, OutcomeState, SkipReason,
    WorkItem,
};
use crate::retry::{classify_http_status, ErrorKind, RetryDecision, RetryPolicy, TransportError};
use crate::storage::PartFile;
use crate::transport::Transport;

/// Knobs for a fetch unit, derived from the run configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub policy: RetryPolicy,
    /// Resolve and log destinations but perform no network I/O.
    pub dry_run: bool,
    /// Re-download when the destination already exists.
    pub overwrite: bool,
    /// Politeness pause after each successful download, taken while holding the slot.
    pub pause_after_download: Duration,
}

impl FetchOptions {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            policy: cfg.retry,
            dry_run: cfg.dry_run,
            overwrite: cfg.overwrite,
            pause_after_download: cfg.pause_after_download,
        }
    }
}

/// States of the per-URL state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    Pending,
    Attempting(u32),
    WaitingBackoff { next_attempt: u32, wait: Duration },
    Succeeded(OutcomeState),
    Failed { reason: FailureReason, attempts: u32 },
}

/// Downloads one work item at a time with bounded retries.
pub struct FetchUnit<T: ?Sized> {
    transport: Arc<T>,
    options: FetchOptions,
    stop: StopSignal,
}

impl<T: Transport + ?Sized> FetchUnit<T> {
    pub fn new(transport: Arc<T>, options: FetchOptions, stop: StopSignal) -> Self {
        Self {
            transport,
            options,
            stop,
        }
    }

    /// Drive `item` to a terminal state.
    pub fn run(&self, item: &WorkItem) -> DownloadOutcome {
        let started = Instant::now();
        let mut history = Vec::new();
        let mut state = FetchState::Pending;

        let final_state = loop {
            state = match state {
                FetchState::Pending => self.start(item),
                FetchState::Attempting(n) => self.attempt(item, n, &mut history),
                FetchState::WaitingBackoff { next_attempt, wait } => {
                    tracing::debug!(url = %item.url(), attempt = next_attempt, "backing off {:?}", wait);
                    if self.stop.sleep(wait) {
                        FetchState::Attempting(next_attempt)
                    } else {
                        FetchState::Failed {
                            reason: FailureReason::Cancelled,
                            attempts: next_attempt - 1,
                        }
                    }
                }
                FetchState::Succeeded(done) => break done,
                FetchState::Failed { reason, attempts } => {
                    break OutcomeState::Failed { reason, attempts }
                }
            };
        };

        let outcome = DownloadOutcome {
            url: item.url().to_string(),
            destination: Some(item.destination().to_path_buf()),
            state: final_state,
            attempts: history.len() as u32,
            elapsed: started.elapsed(),
            history,
        };
        log_outcome(&outcome);
        outcome
    }

    fn start(&self, item: &WorkItem) -> FetchState {
        if self.options.dry_run {
            tracing::info!(url = %item.url(), dest = %item.destination().display(), "dry run");
            return FetchState::Succeeded(OutcomeState::Skipped(SkipReason::DryRun));
        }
        if !self.options.overwrite && item.destination().exists() {
            return FetchState::Succeeded(OutcomeState::Skipped(SkipReason::AlreadyExists));
        }
        if self.stop.is_stopped() {
            return FetchState::Failed {
                reason: FailureReason::Cancelled,
                attempts: 0,
            };
        }
        FetchState::Attempting(1)
    }

    fn attempt(&self, item: &WorkItem, n: u32, history: &mut Vec<AttemptResult>) -> FetchState {
        tracing::debug!(url = %item.url(), attempt = n, "GET");
        let begun = Instant::now();
        let mut part: Option<PartFile> = None;
        let result = self.transport.get(item.url(), &mut |chunk: &[u8]| {
            if part.is_none() {
                let opened = PartFile::create(item.destination())
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{:#}", e)))?;
                part = Some(opened);
            }
            match part.as_mut() {
                Some(file) => file.write_chunk(chunk),
                None => Ok(()),
            }
        });
        let elapsed = begun.elapsed();

        let record = |kind: AttemptKind, hint: Option<Duration>, backoff: Option<Duration>| {
            AttemptResult {
                attempt: n,
                kind,
                elapsed,
                rate_limit_hint: hint,
                backoff,
            }
        };

        match result {
            Ok(response) if response.is_success() => {
                // Empty bodies never open the part file; create it now.
                let file = match part.take() {
                    Some(file) => Ok(file),
                    None => PartFile::create(item.destination()),
                };
                match file.and_then(PartFile::finalize) {
                    Ok(bytes) => {
                        history.push(record(AttemptKind::Success, None, None));
                        if !self.options.pause_after_download.is_zero() {
                            self.stop.sleep(self.options.pause_after_download);
                        }
                        FetchState::Succeeded(OutcomeState::Downloaded { bytes })
                    }
                    Err(e) => {
                        let reason = FailureReason::Filesystem(format!("{:#}", e));
                        history.push(record(AttemptKind::FatalFailure(reason.clone()), None, None));
                        FetchState::Failed { reason, attempts: n }
                    }
                }
            }
            Ok(response) => {
                drop(part);
                let kind = classify_http_status(response.status);
                let reason = FailureReason::Http(response.status);
                self.after_failure(n, kind, reason, response.retry_after, history, record)
            }
            Err(TransportError::Sink(e)) => {
                drop(part);
                let reason = FailureReason::Filesystem(e.to_string());
                history.push(record(AttemptKind::FatalFailure(reason.clone()), None, None));
                FetchState::Failed { reason, attempts: n }
            }
            Err(TransportError::MalformedUrl(msg)) => {
                let reason = FailureReason::MalformedUrl(msg);
                history.push(record(AttemptKind::FatalFailure(reason.clone()), None, None));
                FetchState::Failed { reason, attempts: n }
            }
            Err(e) => {
                // Partial body (if any) is discarded before a retry starts from scratch.
                drop(part);
                let kind = e.kind();
                let reason = FailureReason::Transport(e.to_string());
                self.after_failure(n, kind, reason, None, history, record)
            }
        }
    }

    fn after_failure<R>(
        &self,
        n: u32,
        kind: ErrorKind,
        reason: FailureReason,
        hint: Option<Duration>,
        history: &mut Vec<AttemptResult>,
        record: R,
    ) -> FetchState
    where
        R: Fn(AttemptKind, Option<Duration>, Option<Duration>) -> AttemptResult,
    {
        if !kind.is_retryable() {
            history.push(record(AttemptKind::FatalFailure(reason.clone()), hint, None));
            return FetchState::Failed { reason, attempts: n };
        }
        match self.options.policy.decide(n, kind, hint) {
            RetryDecision::NoRetry => {
                history.push(record(AttemptKind::RetryableFailure(reason.clone()), hint, None));
                FetchState::Failed { reason, attempts: n }
            }
            RetryDecision::RetryAfter(_) if self.stop.is_stopped() => {
                history.push(record(AttemptKind::RetryableFailure(reason), hint, None));
                FetchState::Failed {
                    reason: FailureReason::Cancelled,
                    attempts: n,
                }
            }
            RetryDecision::RetryAfter(wait) => {
                tracing::debug!(attempt = n, "retryable failure: {}", reason);
                history.push(record(AttemptKind::RetryableFailure(reason), hint, Some(wait)));
                FetchState::WaitingBackoff {
                    next_attempt: n + 1,
                    wait,
                }
            }
        }
    }
}

fn log_outcome(outcome: &DownloadOutcome) {
    let dest = outcome
        .destination
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    match &outcome.state {
        OutcomeState::Downloaded { bytes } => tracing::info!(
            url = %outcome.url,
            dest = %dest,
            attempts = outcome.attempts,
            "downloaded {} bytes in {:.2?}",
            bytes,
            outcome.elapsed
        ),
        OutcomeState::Skipped(reason) => {
            tracing::debug!(url = %outcome.url, dest = %dest, "skipped: {:?}", reason)
        }
        OutcomeState::Failed { reason, attempts } => tracing::warn!(
            url = %outcome.url,
            dest = %dest,
            attempts = *attempts,
            "failed: {}",
            reason
        ),
    }
}
