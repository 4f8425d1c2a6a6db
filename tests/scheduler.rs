use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use driftwatch::output::ReportError;
use driftwatch::{
    DetectionSettings, DriftError, DriftOrchestrator, DriftRepository, DriftResult, ErrorKind,
    InMemoryDriftRepository, Instance, InstanceProvider, Origin, OverlapPolicy, ProviderError,
    Reporter, Scheduler,
};
use serde_json::json;

/// Counts listings and optionally stalls each one.
struct SlowProvider {
    origin: Origin,
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
}

impl SlowProvider {
    fn new(origin: Origin, delay: Duration) -> Self {
        Self {
            origin,
            delay,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(origin: Origin) -> Self {
        Self {
            fail: true,
            ..Self::new(origin, Duration::ZERO)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ProviderError::Unavailable("offline".to_string()));
        }
        Ok(vec![Instance::from_value(
            "i-1",
            self.origin,
            json!({ "instance_type": "t3.micro" }),
        )])
    }
}

struct PanickingReporter;

impl Reporter for PanickingReporter {
    fn name(&self) -> &str {
        "panicking"
    }

    fn report_drift(&self, _result: &DriftResult) -> Result<(), ReportError> {
        panic!("reporter crashed");
    }

    fn report_multiple_drifts(&self, _results: &[DriftResult]) -> Result<(), ReportError> {
        panic!("reporter crashed");
    }
}

struct Harness {
    aws: Arc<SlowProvider>,
    repository: Arc<InMemoryDriftRepository>,
    scheduler: Scheduler,
}

fn harness(aws: SlowProvider, schedule: &str, overlap: OverlapPolicy) -> Harness {
    harness_with(aws, schedule, overlap, None)
}

fn harness_with(
    aws: SlowProvider,
    schedule: &str,
    overlap: OverlapPolicy,
    reporter: Option<Arc<dyn Reporter>>,
) -> Harness {
    let aws = Arc::new(aws);
    let repository = Arc::new(InMemoryDriftRepository::new());
    let settings = DetectionSettings {
        schedule: schedule.to_string(),
        overlap,
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let mut orchestrator = DriftOrchestrator::new(
        aws.clone(),
        Arc::new(SlowProvider::new(Origin::Terraform, Duration::ZERO)),
        repository.clone(),
        settings,
    );
    if let Some(reporter) = reporter {
        orchestrator = orchestrator.with_reporter(reporter);
    }

    Harness {
        aws,
        repository,
        scheduler: Scheduler::new(Arc::new(orchestrator)),
    }
}

#[tokio::test]
async fn test_start_requires_schedule() {
    let h = harness(
        SlowProvider::new(Origin::Aws, Duration::ZERO),
        "",
        OverlapPolicy::Allow,
    );

    let err = h.scheduler.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!h.scheduler.is_running());
}

#[tokio::test]
async fn test_start_rejects_invalid_schedule() {
    let h = harness(
        SlowProvider::new(Origin::Aws, Duration::ZERO),
        "every now and then",
        OverlapPolicy::Allow,
    );

    assert!(matches!(h.scheduler.start(), Err(DriftError::Validation(_))));
    assert!(!h.scheduler.is_running());
}

#[tokio::test]
async fn test_ticks_run_detection_repeatedly() {
    let h = harness(
        SlowProvider::new(Origin::Aws, Duration::ZERO),
        "@every 50ms",
        OverlapPolicy::Allow,
    );

    h.scheduler.start().unwrap();
    assert!(h.scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(400)).await;
    h.scheduler.stop();
    assert!(!h.scheduler.is_running());

    let stored = h
        .repository
        .get_drift_results_by_instance_id("i-1")
        .await
        .unwrap();
    assert!(stored.len() >= 2, "expected repeated runs, got {}", stored.len());
    assert!(stored.iter().all(|r| !r.has_drift()));
}

#[tokio::test]
async fn test_stop_halts_ticks() {
    let h = harness(
        SlowProvider::new(Origin::Aws, Duration::ZERO),
        "@every 30ms",
        OverlapPolicy::Allow,
    );

    h.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    h.scheduler.stop();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_stop = h.aws.calls();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(h.aws.calls(), after_stop);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let h = harness(
        SlowProvider::new(Origin::Aws, Duration::ZERO),
        "@every 1h",
        OverlapPolicy::Allow,
    );

    h.scheduler.stop();
    h.scheduler.start().unwrap();
    h.scheduler.stop();
    h.scheduler.stop();
    assert!(!h.scheduler.is_running());
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let h = harness(
        SlowProvider::new(Origin::Aws, Duration::ZERO),
        "@every 1h",
        OverlapPolicy::Allow,
    );

    h.scheduler.start().unwrap();
    assert!(matches!(h.scheduler.start(), Err(DriftError::AlreadyRunning)));
    assert!(h.scheduler.is_running());
}

#[tokio::test]
async fn test_restart_after_stop() {
    let h = harness(
        SlowProvider::new(Origin::Aws, Duration::ZERO),
        "@every 1h",
        OverlapPolicy::Allow,
    );

    h.scheduler.start().unwrap();
    h.scheduler.stop();
    h.scheduler.start().unwrap();
    assert!(h.scheduler.is_running());
}

#[tokio::test]
async fn test_tick_failures_keep_schedule_alive() {
    let h = harness(
        SlowProvider::failing(Origin::Aws),
        "@every 30ms",
        OverlapPolicy::Allow,
    );

    h.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(h.scheduler.is_running());
    assert!(h.aws.calls() >= 2);
    assert!(h.repository.list_drift_results().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_skip_policy_avoids_overlapping_runs() {
    let skip = harness(
        SlowProvider::new(Origin::Aws, Duration::from_millis(300)),
        "@every 50ms",
        OverlapPolicy::Skip,
    );
    let allow = harness(
        SlowProvider::new(Origin::Aws, Duration::from_millis(300)),
        "@every 50ms",
        OverlapPolicy::Allow,
    );

    skip.scheduler.start().unwrap();
    allow.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    skip.scheduler.stop();
    allow.scheduler.stop();

    assert!(skip.aws.calls() <= 3, "skip ran {} times", skip.aws.calls());
    assert!(allow.aws.calls() >= 4, "allow ran {} times", allow.aws.calls());
}

#[tokio::test]
async fn test_skip_policy_recovers_after_panicking_run() {
    let h = harness_with(
        SlowProvider::new(Origin::Aws, Duration::ZERO),
        "@every 30ms",
        OverlapPolicy::Skip,
        Some(Arc::new(PanickingReporter)),
    );

    h.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.scheduler.stop();

    assert!(h.aws.calls() >= 3, "ran {} times", h.aws.calls());
}
