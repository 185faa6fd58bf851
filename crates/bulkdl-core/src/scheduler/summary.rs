//! Aggregate counts over a run's outcomes.

use std::fmt;

use crate::outcome::{DownloadOutcome, OutcomeState};

/// What the scheduler driver did with the plan's work items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: usize,
    /// Items never started because a stop was requested.
    pub undispatched: usize,
}

/// Running totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes: u64,
    pub undispatched: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match &outcome.state {
            OutcomeState::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            OutcomeState::Skipped(_) => self.skipped += 1,
            OutcomeState::Failed { .. } => self.failed += 1,
        }
    }

    pub fn apply_report(&mut self, report: DispatchReport) {
        self.undispatched = report.undispatched;
    }

    /// Outcomes recorded so far.
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// No failures and nothing left behind.
    pub fn is_clean(&self) -> bool {
        !self.has_failures() && self.undispatched == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded ({} bytes), {} skipped, {} failed",
            self.downloaded, self.bytes, self.skipped, self.failed
        )?;
        if self.undispatched > 0 {
            write!(f, ", {} not started", self.undispatched)?;
        }
        Ok(())
    }
}
