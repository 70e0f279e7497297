use chrono::{DateTime, Duration as ChronoDuration, Utc};
use loadprobe_common::{
    DistributionBucket, EndpointStats, ErrorBreakdown, ErrorTimelinePoint, HttpMethod,
    PerformanceMetrics, RequestResult, ResponseTimeStats, TestSummary, ThroughputPoint,
    ThroughputStats,
};
use std::collections::BTreeMap;

/// Response-time histogram edges in milliseconds. The last bucket is open-ended.
pub const DISTRIBUTION_EDGES_MS: [f64; 6] = [0.0, 100.0, 500.0, 1000.0, 2000.0, 5000.0];

const BUCKET_MS: i64 = 1000;

/// Derive every statistic from the complete result list of a run.
///
/// Pure and idempotent; an empty list yields zeroed metrics.
pub fn aggregate(
    results: &[RequestResult],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> PerformanceMetrics {
    PerformanceMetrics {
        response_time: response_time_stats(results),
        distribution: distribution(results),
        throughput: throughput(results, window_start, window_end),
        errors: error_breakdown(results, window_start, window_end),
        endpoints: endpoint_stats(results),
    }
}

/// Nearest-rank percentile over an ascending slice: the value at index
/// `ceil(k/100 * n) - 1`, clamped into range. Returns 0 for an empty slice.
pub fn percentile(sorted: &[f64], k: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (k / 100.0 * sorted.len() as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[idx]
}

fn sorted_times<'a>(results: impl Iterator<Item = &'a RequestResult>) -> Vec<f64> {
    let mut times: Vec<f64> = results.map(|r| r.response_time_ms).collect();
    times.sort_by(|a, b| a.total_cmp(b));
    times
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn response_time_stats(results: &[RequestResult]) -> ResponseTimeStats {
    let sorted = sorted_times(results.iter());
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return ResponseTimeStats::default();
    };
    ResponseTimeStats {
        min,
        max,
        avg: mean(&sorted),
        median: percentile(&sorted, 50.0),
        p95: percentile(&sorted, 95.0),
        p99: percentile(&sorted, 99.0),
    }
}

pub fn distribution(results: &[RequestResult]) -> Vec<DistributionBucket> {
    let mut buckets: Vec<DistributionBucket> = DISTRIBUTION_EDGES_MS
        .iter()
        .enumerate()
        .map(|(i, &min_ms)| {
            let max_ms = DISTRIBUTION_EDGES_MS.get(i + 1).copied();
            let label = match max_ms {
                Some(max) => format!("{min_ms}-{max}ms"),
                None => format!("{min_ms}ms+"),
            };
            DistributionBucket { label, min_ms, max_ms, count: 0 }
        })
        .collect();

    for result in results {
        let idx = DISTRIBUTION_EDGES_MS
            .iter()
            .rposition(|&edge| result.response_time_ms >= edge)
            .unwrap_or(0);
        buckets[idx].count += 1;
    }
    buckets
}

/// Number of whole-second buckets covering `[start, end)`; at least one.
fn bucket_count(start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
    let span_ms = (end - start).num_milliseconds().max(0);
    ((span_ms + BUCKET_MS - 1) / BUCKET_MS).max(1) as usize
}

/// Bucket holding `at`. Results that land outside the window are clamped to
/// the nearest bucket so every result is counted exactly once.
fn bucket_index(at: DateTime<Utc>, start: DateTime<Utc>, buckets: usize) -> usize {
    let offset_ms = (at - start).num_milliseconds().max(0);
    ((offset_ms / BUCKET_MS) as usize).min(buckets - 1)
}

fn bucket_timestamp(start: DateTime<Utc>, second: usize) -> DateTime<Utc> {
    start + ChronoDuration::seconds(second as i64)
}

fn window_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}

pub fn throughput(
    results: &[RequestResult],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> ThroughputStats {
    let buckets = bucket_count(window_start, window_end);
    let mut counts = vec![0u64; buckets];
    for result in results {
        counts[bucket_index(result.start_time, window_start, buckets)] += 1;
    }

    let secs = window_secs(window_start, window_end);
    let avg = if secs > 0.0 { results.len() as f64 / secs } else { 0.0 };
    let max = counts.iter().copied().max().unwrap_or(0) as f64;
    let min = counts.iter().copied().min().unwrap_or(0) as f64;

    let timeline = counts
        .into_iter()
        .enumerate()
        .map(|(second, requests)| ThroughputPoint {
            second: second as u64,
            timestamp: bucket_timestamp(window_start, second),
            requests,
        })
        .collect();

    ThroughputStats { avg, max, min, timeline }
}

pub fn error_breakdown(
    results: &[RequestResult],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> ErrorBreakdown {
    let buckets = bucket_count(window_start, window_end);
    let mut by_status_code = BTreeMap::new();
    let mut by_type = BTreeMap::new();
    let mut per_second: BTreeMap<usize, u64> = BTreeMap::new();
    let mut total = 0;

    for result in results.iter().filter(|r| !r.success) {
        total += 1;
        *by_status_code.entry(result.status_code).or_insert(0) += 1;
        *by_type.entry(result.error_type()).or_insert(0) += 1;
        *per_second
            .entry(bucket_index(result.start_time, window_start, buckets))
            .or_insert(0) += 1;
    }

    let timeline = per_second
        .into_iter()
        .map(|(second, errors)| ErrorTimelinePoint {
            second: second as u64,
            timestamp: bucket_timestamp(window_start, second),
            errors,
        })
        .collect();

    ErrorBreakdown { total, by_status_code, by_type, timeline }
}

/// Per `METHOD path` statistics, ordered by method then path.
pub fn endpoint_stats(results: &[RequestResult]) -> Vec<EndpointStats> {
    let mut groups: BTreeMap<(HttpMethod, &str), Vec<&RequestResult>> = BTreeMap::new();
    for result in results {
        groups.entry((result.method, result.endpoint.as_str())).or_default().push(result);
    }

    groups
        .into_iter()
        .map(|((method, endpoint), group)| {
            let sorted = sorted_times(group.iter().copied());
            EndpointStats {
                method,
                endpoint: endpoint.to_string(),
                requests: group.len() as u64,
                failures: group.iter().filter(|r| !r.success).count() as u64,
                avg_response_time: mean(&sorted),
                min_response_time: sorted.first().copied().unwrap_or(0.0),
                max_response_time: sorted.last().copied().unwrap_or(0.0),
                p95_response_time: percentile(&sorted, 95.0),
            }
        })
        .collect()
}

/// Headline numbers for the run. `error_rate` is a percentage.
pub fn summarize(
    results: &[RequestResult],
    metrics: &PerformanceMetrics,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    concurrency: u32,
    iterations: u64,
) -> TestSummary {
    let total_requests = results.len() as u64;
    let successful_requests = results.iter().filter(|r| r.success).count() as u64;
    let failed_requests = total_requests - successful_requests;
    let error_rate = if total_requests > 0 {
        failed_requests as f64 / total_requests as f64 * 100.0
    } else {
        0.0
    };
    let duration_seconds = window_secs(window_start, window_end);
    let requests_per_second = if duration_seconds > 0.0 {
        total_requests as f64 / duration_seconds
    } else {
        0.0
    };

    TestSummary {
        total_requests,
        successful_requests,
        failed_requests,
        error_rate,
        avg_response_time: metrics.response_time.avg,
        min_response_time: metrics.response_time.min,
        max_response_time: metrics.response_time.max,
        requests_per_second,
        duration_seconds,
        concurrency,
        iterations,
    }
}
