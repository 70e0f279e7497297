use loadprobe_common::{PerformanceMetrics, TestSummary, ThresholdResult, Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    AtMost,
    AtLeast,
}

struct Check {
    name: &'static str,
    label: &'static str,
    unit: &'static str,
    bound: Bound,
    threshold: Option<f64>,
    actual: f64,
}

/// Score the run against every configured threshold, in a fixed order.
/// Unset thresholds produce no entry.
pub fn evaluate(
    thresholds: &Thresholds,
    metrics: &PerformanceMetrics,
    summary: &TestSummary,
) -> Vec<ThresholdResult> {
    let checks = [
        Check {
            name: "avgResponseTime",
            label: "Average response time",
            unit: "ms",
            bound: Bound::AtMost,
            threshold: thresholds.avg_response_time,
            actual: metrics.response_time.avg,
        },
        Check {
            name: "maxResponseTime",
            label: "Maximum response time",
            unit: "ms",
            bound: Bound::AtMost,
            threshold: thresholds.max_response_time,
            actual: metrics.response_time.max,
        },
        Check {
            name: "p95ResponseTime",
            label: "95th percentile response time",
            unit: "ms",
            bound: Bound::AtMost,
            threshold: thresholds.p95_response_time,
            actual: metrics.response_time.p95,
        },
        Check {
            name: "p99ResponseTime",
            label: "99th percentile response time",
            unit: "ms",
            bound: Bound::AtMost,
            threshold: thresholds.p99_response_time,
            actual: metrics.response_time.p99,
        },
        Check {
            name: "errorRate",
            label: "Error rate",
            unit: "%",
            bound: Bound::AtMost,
            threshold: thresholds.error_rate,
            actual: summary.error_rate,
        },
        Check {
            name: "throughput",
            label: "Throughput",
            unit: " req/s",
            bound: Bound::AtLeast,
            threshold: thresholds.throughput,
            actual: summary.requests_per_second,
        },
    ];

    checks.into_iter().filter_map(score).collect()
}

fn score(check: Check) -> Option<ThresholdResult> {
    let threshold = check.threshold?;
    let (passed, op) = match check.bound {
        Bound::AtMost => (check.actual <= threshold, "<="),
        Bound::AtLeast => (check.actual >= threshold, ">="),
    };
    let description = format!(
        "{} {:.2}{} (required {} {:.2}{}): {}",
        check.label,
        check.actual,
        check.unit,
        op,
        threshold,
        check.unit,
        if passed { "passed" } else { "failed" },
    );
    Some(ThresholdResult {
        name: check.name.to_string(),
        threshold_value: threshold,
        actual_value: check.actual,
        passed,
        description,
    })
}

/// Overall verdict: every produced threshold passed. Vacuously true when none were configured.
pub fn all_passed(results: &[ThresholdResult]) -> bool {
    results.iter().all(|r| r.passed)
}
