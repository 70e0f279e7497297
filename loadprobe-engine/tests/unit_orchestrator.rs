mod support;

use loadprobe_client::StaticAuthResolver;
use loadprobe_common::{
    Endpoint, HttpMethod, Scenario, ScenarioStep, StepValidation, TestConfig, Thresholds,
};
use loadprobe_engine::progress::{self, ProgressEvent};
use loadprobe_engine::{deadline_after, start_delay, LoadTest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::FakeTransport;
use tokio_util::sync::CancellationToken;

fn config(concurrency: u32, duration: u64) -> TestConfig {
    TestConfig::new("http://target.local", concurrency, duration)
        .with_endpoints(vec![Endpoint::new(HttpMethod::Get, "/ok")])
}

#[test]
fn test_start_delay_spreads_workers_across_ramp_up() {
    assert_eq!(start_delay(0, 4, 2), Duration::ZERO);
    assert_eq!(start_delay(1, 4, 2), Duration::from_millis(500));
    assert_eq!(start_delay(3, 4, 2), Duration::from_millis(1500));
    assert_eq!(start_delay(2, 3, 1), Duration::from_millis(666));
    assert_eq!(start_delay(5, 10, 0), Duration::ZERO);
}

#[test]
fn test_start_delay_does_not_overflow_on_huge_ramp() {
    assert_eq!(start_delay(3, 4, u64::MAX / 1000), Duration::from_millis(13_835_058_055_282_163_250));
    assert_eq!(start_delay(u32::MAX, 1, u64::MAX), Duration::from_millis(u64::MAX));
}

#[tokio::test]
async fn test_deadline_after_huge_window_is_far_future() {
    let deadline = deadline_after(Duration::MAX);
    assert!(deadline > tokio::time::Instant::now() + Duration::from_secs(86_400 * 365));
}

#[tokio::test]
async fn test_oversized_window_is_rejected_without_panicking() {
    let transport = Arc::new(FakeTransport::new(200, Duration::ZERO));
    let cfg = TestConfig::new("http://target.local", 1, u64::MAX);

    let result = LoadTest::new(cfg).with_transport(transport.clone()).run().await;

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("test window of"), "{:?}", result.errors);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_any_request() {
    let transport = Arc::new(FakeTransport::new(200, Duration::ZERO));
    let bad = TestConfig::new("", 0, 0);

    let result = LoadTest::new(bad).with_transport(transport.clone()).run().await;

    assert!(!result.success);
    assert_eq!(
        result.errors,
        vec![
            "baseURL is required".to_string(),
            "concurrency must be greater than 0".to_string(),
            "duration must be greater than 0".to_string(),
        ]
    );
    assert_eq!(result.summary.total_requests, 0);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_empty_scenario_is_rejected() {
    let transport = Arc::new(FakeTransport::new(200, Duration::ZERO));
    let cfg = config(1, 1).with_scenario(Scenario { name: "nothing".to_string(), steps: vec![] });

    let result = LoadTest::new(cfg).with_transport(transport.clone()).run().await;

    assert!(!result.success);
    assert_eq!(result.errors, vec!["scenario \"nothing\" must contain at least one step".to_string()]);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_unknown_auth_profile_is_a_config_error() {
    let transport = Arc::new(FakeTransport::new(200, Duration::ZERO));
    let mut cfg = config(1, 1);
    cfg.auth_profile = Some("prod".to_string());

    let result = LoadTest::new(cfg).with_transport(transport.clone()).run().await;

    assert!(!result.success);
    assert_eq!(
        result.errors,
        vec!["auth profile could not be resolved: Auth profile not found: prod".to_string()]
    );
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_resolved_auth_headers_reach_every_request() {
    let transport = Arc::new(FakeTransport::new(200, Duration::from_millis(2)));
    let mut cfg = config(2, 1);
    cfg.auth_profile = Some("staging".to_string());
    let resolver = StaticAuthResolver::new().with_bearer("staging", "tok");

    let result = LoadTest::new(cfg)
        .with_transport(transport.clone())
        .with_auth_resolver(Arc::new(resolver))
        .run()
        .await;

    assert!(result.success);
    let seen = transport.seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen
        .iter()
        .all(|r| r.headers.get("Authorization").map(String::as_str) == Some("Bearer tok")));
}

#[tokio::test]
async fn test_no_thresholds_means_success_even_when_everything_fails() {
    let transport = Arc::new(FakeTransport::new(500, Duration::from_millis(2)));

    let result = LoadTest::new(config(2, 1)).with_transport(transport).run().await;

    assert!(result.success);
    assert!(result.threshold_results.is_empty());
    assert_eq!(result.summary.error_rate, 100.0);
    assert_eq!(result.summary.failed_requests, result.summary.total_requests);
    assert_eq!(result.request_errors.len() as u64, result.summary.failed_requests);
    assert_eq!(result.metrics.errors.by_type.get("HTTP 500").copied(), Some(result.summary.total_requests));
}

#[tokio::test]
async fn test_error_rate_threshold_fails_run() {
    let transport = Arc::new(FakeTransport::new(500, Duration::from_millis(2)));
    let cfg = config(1, 1).with_thresholds(Thresholds { error_rate: Some(0.0), ..Thresholds::default() });

    let result = LoadTest::new(cfg).with_transport(transport).run().await;

    assert!(!result.success);
    assert_eq!(result.threshold_results.len(), 1);
    assert_eq!(result.threshold_results[0].name, "errorRate");
    assert!(!result.threshold_results[0].passed);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_summary_and_metrics_agree() {
    let transport = Arc::new(FakeTransport::new(200, Duration::from_millis(5)));

    let result = LoadTest::new(config(3, 1)).with_transport(transport.clone()).run().await;

    let total = result.summary.total_requests;
    assert!(total > 0);
    assert_eq!(total, transport.calls());
    assert_eq!(result.summary.concurrency, 3);
    assert_eq!(result.summary.error_rate, 0.0);
    let bucketed: u64 = result.metrics.throughput.timeline.iter().map(|p| p.requests).sum();
    assert_eq!(bucketed, total);
    let distributed: u64 = result.metrics.distribution.iter().map(|b| b.count).sum();
    assert_eq!(distributed, total);
    assert!(result.end_time > result.start_time);
    assert!(result.summary.duration_seconds >= 1.0);
}

#[tokio::test]
async fn test_ramp_up_and_ramp_down_extend_the_window() {
    let transport = Arc::new(FakeTransport::new(200, Duration::from_millis(1)));
    let (progress_tx, mut progress_rx) = progress::channel();
    let cfg = config(4, 1).with_ramp(1, 1);

    let started = Instant::now();
    let result = LoadTest::new(cfg).with_transport(transport).with_progress(progress_tx).run().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(3), "finished after {elapsed:?}");
    assert!(result.success);

    let mut started_workers = Vec::new();
    while let Ok(event) = progress_rx.try_recv() {
        if let ProgressEvent::WorkerStarted { worker } = event {
            started_workers.push(worker);
        }
    }
    // Staggered 250 ms apart, so they come up in id order.
    assert_eq!(started_workers, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_scenario_iterations_are_summed() {
    let transport = Arc::new(FakeTransport::new(200, Duration::from_millis(5)));
    let steps = vec![
        ScenarioStep::new("login", HttpMethod::Post, "/login"),
        ScenarioStep::new("home", HttpMethod::Get, "/home").with_validation(StepValidation {
            expected_status: Some(201),
            max_response_time_ms: None,
        }),
    ];
    let cfg = TestConfig::new("http://target.local", 2, 1)
        .with_scenario(Scenario { name: "session".to_string(), steps });

    let result = LoadTest::new(cfg).with_transport(transport).run().await;

    assert!(result.success);
    assert!(result.summary.iterations >= 2);
    assert!(result.summary.total_requests >= result.summary.iterations * 2);
    assert!(!result.validation_failures.is_empty());
    assert!(result.validation_failures.iter().all(|f| f.step == "home"));
}

#[tokio::test]
async fn test_cancellation_ends_run_early() {
    let transport = Arc::new(FakeTransport::new(200, Duration::from_millis(1)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = LoadTest::new(config(2, 60))
        .with_transport(transport)
        .with_cancellation(cancel)
        .run()
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(result.summary.total_requests > 0);
    assert!(result.success);
}

#[tokio::test]
async fn test_result_is_json_serializable() {
    let transport = Arc::new(FakeTransport::new(200, Duration::from_millis(5)));
    let result = LoadTest::new(config(1, 1)).with_transport(transport).run().await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["summary"]["totalRequests"].as_u64().unwrap() > 0);
    assert!(json["metrics"]["responseTime"]["p95"].is_number());
    assert!(json["metrics"]["throughput"]["timeline"].is_array());
}
