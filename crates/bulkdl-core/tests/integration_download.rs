//! Integration tests: fetch units and full runs against a local scripted HTTP server.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bulkdl_core::config::{BulkConfig, RunConfig, RunSettings};
use bulkdl_core::control::StopSignal;
use bulkdl_core::fetch::{FetchOptions, FetchUnit};
use bulkdl_core::outcome::{FailureReason, OutcomeState, SkipReason, WorkItem};
use bulkdl_core::retry::RetryPolicy;
use bulkdl_core::scheduler::{self, RunSummary};
use bulkdl_core::transport::{CurlTransport, HttpOptions};
use common::script_server::{ScriptServer, Step};
use tempfile::tempdir;

fn fast_options(max_tries: u32) -> FetchOptions {
    FetchOptions {
        policy: RetryPolicy {
            max_tries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            jitter: 0.0,
        },
        ..FetchOptions::default()
    }
}

fn curl_unit(options: FetchOptions) -> FetchUnit<CurlTransport> {
    FetchUnit::new(
        Arc::new(CurlTransport::new(HttpOptions::default())),
        options,
        StopSignal::new(),
    )
}

#[test]
fn downloads_body_to_destination() {
    let body: Vec<u8> = (0u8..=255).cycle().take(64 * 1024).collect();
    let server = ScriptServer::start(vec![("/data/blob.bin", vec![Step::ok(&body)])]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("data/blob.bin");

    let outcome = curl_unit(fast_options(3)).run(&WorkItem::new(server.url("/data/blob.bin"), &dest));

    assert_eq!(outcome.state, OutcomeState::Downloaded { bytes: body.len() as u64 });
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert!(!dir.path().join("data/blob.bin.part").exists());
}

#[test]
fn always_throttled_gives_up_after_max_tries() {
    let server = ScriptServer::start(vec![("/busy", vec![Step::status(429)])]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("busy");

    let outcome = curl_unit(fast_options(3)).run(&WorkItem::new(server.url("/busy"), &dest));

    assert_eq!(server.hits("/busy"), 3);
    assert_eq!(
        outcome.state,
        OutcomeState::Failed {
            reason: FailureReason::Http(429),
            attempts: 3
        }
    );
    assert!(!dest.exists());
}

#[test]
fn server_errors_then_success() {
    let server = ScriptServer::start(vec![(
        "/flaky",
        vec![Step::status(500), Step::status(500), Step::ok(b"third time")],
    )]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("flaky");

    let outcome = curl_unit(fast_options(3)).run(&WorkItem::new(server.url("/flaky"), &dest));

    assert_eq!(outcome.state, OutcomeState::Downloaded { bytes: 10 });
    assert_eq!(outcome.attempts, 3);
    let waits: Vec<Duration> = outcome.history.iter().filter_map(|a| a.backoff).collect();
    assert_eq!(waits.len(), 2);
    assert!(waits[0] < waits[1]);
    assert_eq!(std::fs::read(&dest).unwrap(), b"third time");
}

#[test]
fn not_found_is_not_retried_and_body_discarded() {
    let server = ScriptServer::start(vec![]);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("missing");

    let outcome = curl_unit(fast_options(10)).run(&WorkItem::new(server.url("/missing"), &dest));

    assert_eq!(server.hits("/missing"), 1);
    assert_eq!(outcome.failure_reason(), Some(&FailureReason::Http(404)));
    assert!(!dest.exists());
}

#[test]
fn retry_after_header_is_honored() {
    let server = ScriptServer::start(vec![(
        "/limited",
        vec![Step::throttled(1), Step::ok(b"ok")],
    )]);
    let dir = tempdir().unwrap();

    let started = Instant::now();
    let outcome = curl_unit(fast_options(3)).run(&WorkItem::new(
        server.url("/limited"),
        dir.path().join("limited"),
    ));

    assert_eq!(outcome.state, OutcomeState::Downloaded { bytes: 2 });
    assert_eq!(outcome.history[0].rate_limit_hint, Some(Duration::from_secs(1)));
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[test]
fn connection_refused_is_retried() {
    // Bind then drop to get a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let dir = tempdir().unwrap();

    let outcome = curl_unit(fast_options(2)).run(&WorkItem::new(
        format!("http://127.0.0.1:{}/x", port),
        dir.path().join("x"),
    ));

    assert_eq!(outcome.attempts, 2);
    assert!(matches!(
        outcome.failure_reason(),
        Some(FailureReason::Transport(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_run_strips_prefix_and_reports_every_url() {
    let server = ScriptServer::start(vec![
        ("/bulk/2020/a.csv", vec![Step::ok(b"a,b\n1,2\n")]),
        ("/bulk/2021/b.csv", vec![Step::status(503), Step::ok(b"x\n")]),
        ("/bulk/2021/gone.csv", vec![Step::status(404)]),
        ("/bulk/notes.txt", vec![Step::ok(b"skip me")]),
    ]);
    let dir = tempdir().unwrap();
    let settings = RunSettings {
        download_dir: dir.path().to_path_buf(),
        prefixes: vec![server.url("/bulk/")],
        filter: Some(r"\.txt$".to_string()),
        reverse: true,
        max_tries: Some(3),
        concurrency: Some(2),
        ..RunSettings::default()
    };
    let mut file_cfg = BulkConfig::default();
    file_cfg.retry = Some(bulkdl_core::config::RetryConfig {
        max_tries: 3,
        base_delay_secs: 0.01,
        max_delay_secs: 1,
        jitter: 0.0,
    });
    let config = RunConfig::from_settings(settings, &file_cfg).unwrap();
    let urls = vec![
        server.url("/bulk/2020/a.csv"),
        server.url("/bulk/2021/b.csv"),
        server.url("/bulk/2021/gone.csv"),
        server.url("/bulk/notes.txt"),
        "definitely not a url".to_string(),
    ];
    let transport = Arc::new(CurlTransport::new(config.http));

    let (outcomes, report) = scheduler::start(&config, urls, transport, StopSignal::new())
        .collect()
        .await
        .unwrap();
    let mut summary = RunSummary::default();
    outcomes.iter().for_each(|o| summary.record(o));
    summary.apply_report(report);

    assert_eq!(outcomes.len(), 4);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.failed, 2);
    assert!(!summary.is_clean());
    assert_eq!(server.hits("/bulk/notes.txt"), 0);
    assert_eq!(std::fs::read(dir.path().join("2020/a.csv")).unwrap(), b"a,b\n1,2\n");
    assert_eq!(std::fs::read(dir.path().join("2021/b.csv")).unwrap(), b"x\n");
    assert!(!dir.path().join("2021/gone.csv").exists());
}

#[tokio::test]
async fn colliding_urls_make_no_requests() {
    let server = ScriptServer::start(vec![
        ("/one/report.pdf", vec![Step::ok(b"1")]),
        ("/two/report.pdf", vec![Step::ok(b"2")]),
    ]);
    let dir = tempdir().unwrap();
    let settings = RunSettings {
        download_dir: dir.path().to_path_buf(),
        prefixes: vec!["/one/".to_string(), "/two/".to_string()],
        ..RunSettings::default()
    };
    let config = RunConfig::from_settings(settings, &BulkConfig::default()).unwrap();
    let urls = vec![server.url("/one/report.pdf"), server.url("/two/report.pdf")];

    let (outcomes, _) = scheduler::start(
        &config,
        urls,
        Arc::new(CurlTransport::new(config.http)),
        StopSignal::new(),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o.failure_reason(), Some(FailureReason::Collision(_)))));
    assert_eq!(server.total_hits(), 0);
    assert!(!dir.path().join("report.pdf").exists());
}

#[tokio::test]
async fn existing_files_are_skipped() {
    let server = ScriptServer::start(vec![("/keep.txt", vec![Step::ok(b"new")])]);
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("keep.txt"), b"old").unwrap();
    let settings = RunSettings {
        download_dir: dir.path().to_path_buf(),
        ..RunSettings::default()
    };
    let config = RunConfig::from_settings(settings, &BulkConfig::default()).unwrap();

    let (outcomes, _) = scheduler::start(
        &config,
        vec![server.url("/keep.txt")],
        Arc::new(CurlTransport::new(config.http)),
        StopSignal::new(),
    )
    .collect()
    .await
    .unwrap();

    assert_eq!(outcomes[0].state, OutcomeState::Skipped(SkipReason::AlreadyExists));
    assert_eq!(server.hits("/keep.txt"), 0);
    assert_eq!(std::fs::read(dir.path().join("keep.txt")).unwrap(), b"old");
}
