//! Bounded dispatch of fetch units and the outcome stream.
//!
//! Keeps up to `concurrency` units running at once; when one finishes, the
//! next work item in plan order is started until the plan is exhausted or a
//! stop is requested.

use anyhow::{Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::MAX_CONCURRENCY;
use crate::control::StopSignal;
use crate::fetch::{FetchOptions, FetchUnit};
use crate::outcome::{DownloadOutcome, FailureReason, WorkItem};
use crate::transport::Transport;

use super::plan::Plan;
use super::summary::DispatchReport;

/// Dispatches a plan's work items over a bounded pool.
pub struct Scheduler<T: ?Sized> {
    transport: Arc<T>,
    options: FetchOptions,
    concurrency: usize,
    stop: StopSignal,
}

impl<T> Scheduler<T>
where
    T: Transport + ?Sized + 'static,
{
    pub fn new(transport: Arc<T>, options: FetchOptions, concurrency: usize, stop: StopSignal) -> Self {
        Self {
            transport,
            options,
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            stop,
        }
    }

    /// Start running `plan` on the current tokio runtime.
    ///
    /// Rejected outcomes come first, then one outcome per dispatched item in
    /// completion order. The stream is single-pass.
    pub fn run(&self, plan: Plan) -> OutcomeStream {
        let (tx, rx) = mpsc::channel(self.concurrency.saturating_mul(2));
        let unit = Arc::new(FetchUnit::new(
            Arc::clone(&self.transport),
            self.options,
            self.stop.clone(),
        ));
        let driver = tokio::spawn(drive(plan, unit, self.concurrency, self.stop.clone(), tx));
        OutcomeStream { rx, driver }
    }
}

async fn drive<T>(
    plan: Plan,
    unit: Arc<FetchUnit<T>>,
    concurrency: usize,
    stop: StopSignal,
    tx: mpsc::Sender<DownloadOutcome>,
) -> DispatchReport
where
    T: Transport + ?Sized + 'static,
{
    // Once nobody reads outcomes, starting more downloads is pointless.
    let mut receiver_gone = false;
    for outcome in plan.rejected {
        if tx.send(outcome).await.is_err() {
            receiver_gone = true;
            break;
        }
    }

    let mut queue = plan.items.into_iter();
    let mut join_set = JoinSet::new();
    let mut report = DispatchReport::default();

    loop {
        while join_set.len() < concurrency && !stop.is_stopped() && !receiver_gone {
            let Some(item) = queue.next() else {
                break;
            };
            let unit = Arc::clone(&unit);
            report.dispatched += 1;
            join_set.spawn_blocking(move || run_unit(&unit, item));
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        match joined {
            Ok(outcome) => {
                if !receiver_gone && tx.send(outcome).await.is_err() {
                    tracing::warn!("outcome receiver dropped, dispatching no further items");
                    receiver_gone = true;
                }
            }
            // Panics are caught in `run_unit`; only runtime shutdown lands here.
            Err(e) => tracing::error!("fetch task join: {}", e),
        }
    }

    report.undispatched = queue.len();
    if report.undispatched > 0 {
        tracing::info!(undispatched = report.undispatched, "stopped before dispatching all items");
    }
    report
}

/// Run one unit. A panic becomes `Failed(Internal)` for that item so every
/// dispatched item still yields exactly one outcome.
fn run_unit<T>(unit: &FetchUnit<T>, item: WorkItem) -> DownloadOutcome
where
    T: Transport + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| unit.run(&item))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "fetch unit panicked".to_string());
            tracing::error!(url = %item.url(), "fetch unit panicked: {}", message);
            DownloadOutcome::rejected(
                item.url(),
                Some(item.destination().to_path_buf()),
                FailureReason::Internal(message),
            )
        }
    }
}

/// Outcomes of a running scheduler, in completion order.
pub struct OutcomeStream {
    rx: mpsc::Receiver<DownloadOutcome>,
    driver: JoinHandle<DispatchReport>,
}

impl OutcomeStream {
    /// Next outcome, or `None` once every dispatched unit has reported.
    pub async fn next(&mut self) -> Option<DownloadOutcome> {
        self.rx.recv().await
    }

    /// Wait for the driver and return its dispatch report. Outcomes not yet
    /// received are dropped.
    pub async fn finish(self) -> Result<DispatchReport> {
        let Self { rx, driver } = self;
        drop(rx);
        driver.await.context("scheduler task join")
    }

    /// Drain every outcome, then finish.
    pub async fn collect(mut self) -> Result<(Vec<DownloadOutcome>, DispatchReport)> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next().await {
            outcomes.push(outcome);
        }
        let report = self.finish().await?;
        Ok((outcomes, report))
    }
}
