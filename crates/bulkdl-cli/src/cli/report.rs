//! Human-readable outcome lines and the end-of-run summary.

use std::io::{self, Write};

use bulkdl_core::outcome::{DownloadOutcome, OutcomeState, SkipReason};
use bulkdl_core::scheduler::{DispatchReport, RunSummary};

use super::{EXIT_FAILURES, EXIT_OK};

/// Writes one line per outcome and keeps the running totals.
pub struct Reporter<W: Write> {
    out: W,
    summary: RunSummary,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            summary: RunSummary::default(),
        }
    }

    pub fn outcome(&mut self, outcome: &DownloadOutcome) -> io::Result<()> {
        self.summary.record(outcome);
        let dest = outcome
            .destination
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        match &outcome.state {
            OutcomeState::Downloaded { bytes } => writeln!(
                self.out,
                "ok      {} -> {} ({} bytes, {} attempt{}, {:.1?})",
                outcome.url,
                dest,
                bytes,
                outcome.attempts,
                plural(outcome.attempts),
                outcome.elapsed
            ),
            OutcomeState::Skipped(SkipReason::DryRun) => {
                writeln!(self.out, "dry-run {} -> {}", outcome.url, dest)
            }
            OutcomeState::Skipped(SkipReason::AlreadyExists) => {
                writeln!(self.out, "exists  {} -> {}", outcome.url, dest)
            }
            OutcomeState::Failed { reason, attempts } => writeln!(
                self.out,
                "FAILED  {} -> {}: {} ({} attempt{})",
                outcome.url,
                dest,
                reason,
                attempts,
                plural(*attempts)
            ),
        }
    }

    /// Print the summary line and return the totals.
    pub fn finish(mut self, report: DispatchReport) -> io::Result<RunSummary> {
        self.summary.apply_report(report);
        writeln!(self.out, "{}", self.summary)?;
        self.out.flush()?;
        Ok(self.summary)
    }
}

fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Non-zero when anything failed or the run was cut short.
pub fn exit_code(summary: &RunSummary, interrupted: bool) -> i32 {
    if interrupted || !summary.is_clean() {
        EXIT_FAILURES
    } else {
        EXIT_OK
    }
}
