#![allow(clippy::unwrap_used)]
// Integration tests for `LoadEngine`: stub transfers for scheduling and
// aggregation, wiremock for one end-to-end run with real clients.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use routerbench_api::{
    Pattern, Transfer, TransferOptions, TransferRequest, TransferResult, TransferStatus,
    TransportConfig,
};
use routerbench_core::{
    CoreError, LoadEngine, LoadPhase, LoadTestConfig, PatternSelector, RouterTransferFactory,
    TransferFactory,
};

// ── Stubs ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Gauge {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct StubTransfer {
    latency: Duration,
    size: u64,
    gauge: Gauge,
    fail_on: Option<Pattern>,
    panic_on: Option<Pattern>,
}

impl StubTransfer {
    fn new(latency: Duration, size: u64) -> Self {
        Self {
            latency,
            size,
            gauge: Gauge::default(),
            fail_on: None,
            panic_on: None,
        }
    }
}

impl Transfer for StubTransfer {
    async fn transfer(&self, pattern: Pattern, _request: &TransferRequest) -> TransferResult {
        let result = TransferResult::started(Some(pattern));

        let now = self.gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.gauge.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on == Some(pattern) {
            panic!("stub transfer exploded");
        }
        if self.fail_on == Some(pattern) {
            return result.time_out("stub deadline");
        }
        result
            .with_request_id(format!("stub-{}", pattern.letter()))
            .complete(Some(self.size))
    }
}

struct StubFactory {
    template: StubTransfer,
    created: Arc<AtomicUsize>,
    broken: bool,
}

impl StubFactory {
    fn new(template: StubTransfer) -> Self {
        Self {
            template,
            created: Arc::new(AtomicUsize::new(0)),
            broken: false,
        }
    }
}

impl TransferFactory for StubFactory {
    type Client = StubTransfer;

    fn create(&self) -> Result<StubTransfer, routerbench_api::Error> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(routerbench_api::Error::Tls("no usable CA bundle".into()));
        }
        Ok(self.template.clone())
    }
}

fn config(total: usize, concurrency: usize, pattern: PatternSelector) -> LoadTestConfig {
    LoadTestConfig {
        total_requests: total,
        concurrency,
        pattern,
        timeout: Duration::from_secs(5),
        ..LoadTestConfig::default()
    }
}

fn count_pattern(results: &[TransferResult], pattern: Pattern) -> usize {
    results.iter().filter(|r| r.pattern == Some(pattern)).count()
}

// ── Scheduling & aggregation ────────────────────────────────────────

#[tokio::test]
async fn test_buffered_run_aggregates_every_request() {
    let stub = StubTransfer::new(Duration::from_millis(100), 1000);
    let gauge = stub.gauge.clone();
    let factory = StubFactory::new(stub);
    let created = Arc::clone(&factory.created);

    let engine = LoadEngine::new(config(10, 3, PatternSelector::A), factory).unwrap();
    let phase = engine.phase();
    assert_eq!(*phase.borrow(), LoadPhase::Configured);

    let report = engine.run().await.unwrap();
    let summary = &report.summary;

    assert_eq!(summary.total_requests, 10);
    assert_eq!(summary.successful_requests, 10);
    assert_eq!(summary.failed_requests, 0);
    assert_eq!(summary.total_bytes, 10_000);
    assert_eq!(summary.ttfb_values.len(), 10);
    assert!(summary.ttfb_mean >= 0.1 && summary.ttfb_mean < 0.5, "{}", summary.ttfb_mean);
    assert!(summary.requests_per_second > 0.0);
    assert_eq!(count_pattern(&report.results, Pattern::Buffered), 10);

    // One client per operation, never more than `concurrency` in flight.
    assert_eq!(created.load(Ordering::SeqCst), 10);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
    assert_eq!(*phase.borrow(), LoadPhase::Done);
}

#[tokio::test]
async fn test_mixed_run_rotates_patterns() {
    let mut stub = StubTransfer::new(Duration::from_millis(10), 64);
    stub.fail_on = Some(Pattern::Streaming);

    let engine = LoadEngine::new(config(9, 4, PatternSelector::Mixed), StubFactory::new(stub)).unwrap();
    let report = engine.run().await.unwrap();

    assert_eq!(report.results.len(), 9);
    for pattern in [Pattern::Buffered, Pattern::Streaming, Pattern::Offload] {
        assert_eq!(count_pattern(&report.results, pattern), 3);
    }
    assert_eq!(report.summary.successful_requests, 6);
    assert_eq!(report.summary.failed_requests, 3);
    assert!(
        report
            .results
            .iter()
            .filter(|r| r.pattern == Some(Pattern::Streaming))
            .all(|r| r.status == TransferStatus::Timeout)
    );
}

#[tokio::test]
async fn test_panicking_transfer_becomes_error_result() {
    let mut stub = StubTransfer::new(Duration::from_millis(5), 10);
    stub.panic_on = Some(Pattern::Offload);

    let engine = LoadEngine::new(config(9, 3, PatternSelector::Mixed), StubFactory::new(stub)).unwrap();
    let report = engine.run().await.unwrap();

    assert_eq!(report.summary.total_requests, 9);
    assert_eq!(report.summary.failed_requests, 3);
    let panicked: Vec<&TransferResult> = report
        .results
        .iter()
        .filter(|r| r.pattern == Some(Pattern::Offload))
        .collect();
    assert!(panicked.iter().all(|r| {
        r.status == TransferStatus::Error && r.error.as_deref().unwrap_or("").contains("panicked")
    }));
}

#[tokio::test]
async fn test_client_creation_failure_is_counted() {
    let mut factory = StubFactory::new(StubTransfer::new(Duration::ZERO, 1));
    factory.broken = true;

    let engine = LoadEngine::new(config(5, 2, PatternSelector::B), factory).unwrap();
    let report = engine.run().await.unwrap();

    assert_eq!(report.summary.failed_requests, 5);
    assert!(report.summary.ttfb_values.is_empty());
    assert!(report.results.iter().all(|r| {
        r.pattern == Some(Pattern::Streaming)
            && r.error.as_deref() == Some("TLS error: no usable CA bundle")
    }));
}

#[tokio::test]
async fn test_progress_observer_sees_every_completion() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let engine = LoadEngine::new(
        config(5, 2, PatternSelector::C),
        StubFactory::new(StubTransfer::new(Duration::from_millis(5), 1)),
    )
    .unwrap()
    .on_progress(move |p| sink.lock().unwrap().push((p.completed, p.total)));

    engine.run().await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
}

// ── Validation & cancellation ───────────────────────────────────────

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let factory = StubFactory::new(StubTransfer::new(Duration::ZERO, 1));
    let err = LoadEngine::new(config(10, 0, PatternSelector::A), factory)
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::InvalidConfig { .. }));
}

#[tokio::test]
async fn test_cancelled_run_is_interrupted() {
    let token = CancellationToken::new();
    let engine = LoadEngine::new(
        config(100, 2, PatternSelector::A),
        StubFactory::new(StubTransfer::new(Duration::from_millis(100), 1)),
    )
    .unwrap()
    .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        token.cancel();
    });

    let err = engine.run().await.unwrap_err();
    canceller.await.unwrap();

    match err {
        CoreError::Interrupted { completed, total } => {
            assert_eq!(total, 100);
            assert!(completed < 100);
        }
        other => panic!("expected Interrupted, got {other:?}"),
    }
}

// ── End to end ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_router_factory_runs_against_mock_router() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/datasets/request-sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "sync-1",
            "status": "completed",
            "data_size_bytes": 1024,
        })))
        .expect(6)
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).unwrap();
    let factory = RouterTransferFactory::new(
        base_url.clone(),
        TransportConfig::with_timeout(Duration::from_secs(5)),
        TransferOptions::default(),
    );
    let run = LoadTestConfig {
        base_url,
        ..config(6, 3, PatternSelector::A)
    };

    let report = LoadEngine::new(run, factory).unwrap().run().await.unwrap();

    assert_eq!(report.summary.successful_requests, 6);
    assert_eq!(report.summary.total_bytes, 6 * 1024);
    assert!(report.results.iter().all(|r| r.request_id == "sync-1"));
}
