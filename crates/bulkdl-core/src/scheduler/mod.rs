//! Run scheduler.
//!
//! Coordinates a whole run: select → plan (path mapping, collision
//! detection) → bounded dispatch of fetch units → outcome stream.

mod collision;
mod plan;
mod run;
mod summary;

pub use plan::Plan;
pub use run::{OutcomeStream, Scheduler};
pub use summary::{DispatchReport, RunSummary};

use std::sync::Arc;

use crate::config::RunConfig;
use crate::control::StopSignal;
use crate::fetch::FetchOptions;
use crate::select::UrlSelector;
use crate::transport::Transport;

/// Filter, plan and start downloading `urls` according to `config`.
///
/// Must be called from within a tokio runtime.
pub fn start<T>(config: &RunConfig, urls: Vec<String>, transport: Arc<T>, stop: StopSignal) -> OutcomeStream
where
    T: Transport + ?Sized + 'static,
{
    let total = urls.len();
    let selected: Vec<String> = UrlSelector::from_config(config).select(urls).collect();
    let plan = Plan::prepare(selected, &config.mapping, &config.download_dir);
    tracing::info!(
        input = total,
        queued = plan.items.len(),
        rejected = plan.rejected.len(),
        concurrency = config.concurrency,
        dry_run = config.dry_run,
        "plan ready"
    );
    Scheduler::new(transport, FetchOptions::from_config(config), config.concurrency, stop).run(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BulkConfig, RunSettings};
    use crate::outcome::OutcomeState;
    use crate::transport::fake::ScriptedTransport;

    #[tokio::test]
    async fn start_filters_strips_and_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RunSettings {
            download_dir: dir.path().to_path_buf(),
            prefixes: vec!["/pub/".to_string()],
            filter: Some(r"\.csv$".to_string()),
            max_tries: Some(1),
            ..RunSettings::default()
        };
        let config = RunConfig::from_settings(settings, &BulkConfig::default()).unwrap();
        let urls = vec![
            "https://h/pub/2020/a.csv".to_string(),
            "https://h/pub/2020/readme.txt".to_string(),
            "https://h/pub/2021/b.csv".to_string(),
        ];
        let transport = Arc::new(ScriptedTransport::new());

        let (outcomes, report) = start(&config, urls, Arc::clone(&transport), StopSignal::new())
            .collect()
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(report.dispatched, 2);
        assert_eq!(transport.total_calls(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.state, OutcomeState::Downloaded { .. })));
        assert_eq!(
            std::fs::read(dir.path().join("2020/a.csv")).unwrap(),
            b"https://h/pub/2020/a.csv"
        );
        assert!(dir.path().join("2021/b.csv").exists());
        assert!(!dir.path().join("2020/readme.txt").exists());
    }
}
