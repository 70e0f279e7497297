use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::HttpMethod;

/// Outcome of a single HTTP call. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub response_time_ms: f64,
    /// `0` means the request never produced an HTTP response.
    pub status_code: u16,
    pub success: bool,
    pub endpoint: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestResult {
    /// A request that received an HTTP response, whatever its status.
    pub fn completed(
        method: HttpMethod,
        endpoint: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        status_code: u16,
    ) -> Self {
        Self {
            start_time,
            end_time,
            response_time_ms: elapsed_ms(start_time, end_time),
            status_code,
            success: Self::is_success_status(status_code),
            endpoint: endpoint.into(),
            method,
            error: None,
        }
    }

    /// A request that failed below HTTP (DNS, refused connection, timeout).
    pub fn failed(
        method: HttpMethod,
        endpoint: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            start_time,
            end_time,
            response_time_ms: elapsed_ms(start_time, end_time),
            status_code: 0,
            success: false,
            endpoint: endpoint.into(),
            method,
            error: Some(error.into()),
        }
    }

    /// `true` for statuses in `[200, 400)`.
    pub fn is_success_status(status_code: u16) -> bool {
        (200..400).contains(&status_code)
    }

    /// Key used to group failures: the transport error, or `HTTP <status>`.
    pub fn error_type(&self) -> String {
        match &self.error {
            Some(message) => message.clone(),
            None => format!("HTTP {}", self.status_code),
        }
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let micros = (end - start).num_microseconds().unwrap_or(i64::MAX).max(0);
    micros as f64 / 1000.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Count of requests whose response time falls in `[minMs, maxMs)`.
/// `maxMs` is absent for the open-ended top bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBucket {
    pub label: String,
    pub min_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ms: Option<f64>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputPoint {
    /// Offset of the bucket from the window start, in whole seconds.
    pub second: u64,
    pub timestamp: DateTime<Utc>,
    pub requests: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub timeline: Vec<ThroughputPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTimelinePoint {
    pub second: u64,
    pub timestamp: DateTime<Utc>,
    pub errors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBreakdown {
    pub total: u64,
    pub by_status_code: BTreeMap<u16, u64>,
    pub by_type: BTreeMap<String, u64>,
    /// Seconds with no errors are left out.
    pub timeline: Vec<ErrorTimelinePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub method: HttpMethod,
    pub endpoint: String,
    pub requests: u64,
    pub failures: u64,
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub p95_response_time: f64,
}

/// Statistics derived once from the full result list at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub response_time: ResponseTimeStats,
    pub distribution: Vec<DistributionBucket>,
    pub throughput: ThroughputStats,
    pub errors: ErrorBreakdown,
    pub endpoints: Vec<EndpointStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Percentage of failed requests, `0.0..=100.0`.
    pub error_rate: f64,
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub requests_per_second: f64,
    pub duration_seconds: f64,
    pub concurrency: u32,
    /// Completed scenario passes; always 0 in load mode.
    pub iterations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdResult {
    pub name: String,
    pub threshold_value: f64,
    pub actual_value: f64,
    pub passed: bool,
    pub description: String,
}

/// A scenario step whose response did not match its validation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub worker: u32,
    pub iteration: u64,
    pub step: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The terminal report of a test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResult {
    pub test_id: String,
    pub success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub summary: TestSummary,
    pub metrics: PerformanceMetrics,
    pub threshold_results: Vec<ThresholdResult>,
    /// Configuration problems that rejected the run, or workers that crashed.
    pub errors: Vec<String>,
    /// Every failed request, in collection order.
    pub request_errors: Vec<RequestResult>,
    pub validation_failures: Vec<ValidationFailure>,
}

impl PerformanceResult {
    /// A run rejected before any worker started.
    pub fn rejected(test_id: impl Into<String>, concurrency: u32, errors: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            test_id: test_id.into(),
            success: false,
            start_time: now,
            end_time: now,
            summary: TestSummary { concurrency, ..TestSummary::default() },
            metrics: PerformanceMetrics::default(),
            threshold_results: Vec::new(),
            errors,
            request_errors: Vec::new(),
            validation_failures: Vec::new(),
        }
    }
}
