//! `bulkdl run` – download every URL in a list.

use anyhow::{Context, Result};
use bulkdl_core::config::{BulkConfig, RunConfig};
use bulkdl_core::control::StopSignal;
use bulkdl_core::scheduler;
use bulkdl_core::select;
use bulkdl_core::transport::CurlTransport;
use std::sync::Arc;

use crate::cli::report::{exit_code, Reporter};
use crate::cli::{RunArgs, EXIT_FAILURES};

pub async fn run_download(args: &RunArgs, cfg: &BulkConfig) -> Result<i32> {
    let urls = select::read_url_list(&args.urls_file)?;
    let run_cfg =
        RunConfig::from_settings(args.to_settings(), cfg).context("invalid run configuration")?;
    tracing::info!(
        urls = urls.len(),
        dir = %run_cfg.download_dir.display(),
        "starting run"
    );

    let stop = StopSignal::new();
    spawn_interrupt_handler(stop.clone());

    let transport = Arc::new(CurlTransport::new(run_cfg.http));
    let mut stream = scheduler::start(&run_cfg, urls, transport, stop.clone());

    let mut reporter = Reporter::new(std::io::stdout());
    while let Some(outcome) = stream.next().await {
        reporter.outcome(&outcome)?;
    }
    let report = stream.finish().await?;
    let summary = reporter.finish(report)?;

    let interrupted = stop.is_stopped();
    tracing::info!(interrupted, "run finished: {}", summary);
    Ok(exit_code(&summary, interrupted))
}

/// What an interrupt should do, given how many have arrived so far.
#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    /// Stop dispatching; in-flight downloads finish their current request.
    Stop,
    /// Leave now, abandoning whatever is still in flight.
    Abort,
}

fn on_interrupt(count: usize, stop: &StopSignal) -> InterruptAction {
    if count <= 1 {
        stop.request_stop();
        InterruptAction::Stop
    } else {
        InterruptAction::Abort
    }
}

/// First Ctrl-C stops dispatch; a second one exits immediately.
fn spawn_interrupt_handler(stop: StopSignal) {
    tokio::spawn(async move {
        let mut count = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            count += 1;
            match on_interrupt(count, &stop) {
                InterruptAction::Stop => {
                    eprintln!("interrupted; waiting for in-flight downloads (Ctrl-C again to abort)");
                    tracing::warn!("interrupt received, stopping dispatch");
                }
                InterruptAction::Abort => {
                    eprintln!("aborting");
                    tracing::warn!("second interrupt, aborting in-flight downloads");
                    std::process::exit(EXIT_FAILURES);
                }
            }
        }
    });
}
