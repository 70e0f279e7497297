use chrono::Utc;
use loadprobe_client::{AuthResolver, Client, ClientConfig, HttpTransport, StaticAuthResolver};
use loadprobe_common::{ConfigError, PerformanceResult, RequestResult, TestConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::executor::RequestExecutor;
use crate::metrics;
use crate::progress::ProgressSender;
use crate::selector::EndpointSelector;
use crate::thresholds;
use crate::worker::{VirtualUser, WorkerContext, WorkerReport, Workload};

/// Start delay for worker `worker` (0-indexed) so that start times are spread
/// linearly across the ramp-up window: `worker * ramp_up * 1000 / concurrency` ms.
pub fn start_delay(worker: u32, concurrency: u32, ramp_up_secs: u64) -> Duration {
    if concurrency == 0 {
        return Duration::ZERO;
    }
    let spread_ms = u128::from(worker) * u128::from(ramp_up_secs) * 1000 / u128::from(concurrency);
    Duration::from_millis(u64::try_from(spread_ms).unwrap_or(u64::MAX))
}

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + window`, capped at roughly 30 years out when that would overflow the clock.
pub fn deadline_after(window: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(window)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// One configured load test, ready to run.
///
/// Defaults: a reqwest [`Client`], an empty [`StaticAuthResolver`], no progress
/// channel and a fresh cancellation token.
pub struct LoadTest {
    config: TestConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Arc<dyn AuthResolver>,
    progress: Option<ProgressSender>,
    cancel: CancellationToken,
}

impl LoadTest {
    pub fn new(config: TestConfig) -> Self {
        Self {
            config,
            transport: None,
            auth: Arc::new(StaticAuthResolver::new()),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_auth_resolver(mut self, auth: Arc<dyn AuthResolver>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Cancelling the token stops every worker at its next iteration boundary.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the test to completion. Never fails: a bad configuration comes back
    /// as a result with `success == false` and the problems in `errors`.
    pub async fn run(self) -> PerformanceResult {
        let test_id = Uuid::new_v4().to_string();
        let span = info_span!("load_test", test_id = %test_id);
        self.run_inner(test_id).instrument(span).await
    }

    async fn run_inner(self, test_id: String) -> PerformanceResult {
        let config = &self.config;

        if let Err(errors) = config.validate() {
            let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
            warn!(?errors, "configuration rejected");
            return PerformanceResult::rejected(test_id, config.concurrency, errors);
        }

        let auth_headers = match self.resolve_auth().await {
            Ok(headers) => headers,
            Err(e) => {
                warn!(error = %e, "configuration rejected");
                return PerformanceResult::rejected(test_id, config.concurrency, vec![e.to_string()]);
            }
        };

        let transport = match self.transport.clone() {
            Some(transport) => transport,
            None => match Client::new(ClientConfig::default()) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    error!(error = %e, "failed to build HTTP client");
                    return PerformanceResult::rejected(test_id, config.concurrency, vec![e.to_string()]);
                }
            },
        };

        let executor = Arc::new(RequestExecutor::new(
            transport,
            &config.base_url,
            config.headers.clone(),
            auth_headers,
            config.request_timeout(),
        ));
        let workload = match &config.scenario {
            Some(scenario) => Workload::Scenario(Arc::new(scenario.clone())),
            None => Workload::Load(Arc::new(EndpointSelector::new(config.effective_endpoints()))),
        };

        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(collect(results_rx));

        let window = config.total_window();
        let start_time = Utc::now();
        let ctx = Arc::new(WorkerContext {
            executor,
            workload,
            stop_at: deadline_after(window),
            pacing: config.pacing(),
            results: results_tx,
            progress: self.progress.clone(),
            cancel: self.cancel.clone(),
        });

        info!(
            base_url = %config.base_url,
            concurrency = config.concurrency,
            window_secs = window.as_secs(),
            mode = if config.scenario.is_some() { "scenario" } else { "load" },
            "starting load test"
        );

        let handles: Vec<_> = (0..config.concurrency)
            .map(|id| {
                let rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(id))),
                    None => StdRng::from_entropy(),
                };
                let delay = start_delay(id, config.concurrency, config.ramp_up);
                let user = VirtualUser::new(id, delay, rng, Arc::clone(&ctx));
                tokio::spawn(user.run().in_current_span())
            })
            .collect();
        // Workers hold the only remaining senders; the collector ends when they do.
        drop(ctx);

        let mut errors = Vec::new();
        let mut reports: Vec<WorkerReport> = Vec::with_capacity(handles.len());
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(worker = id, error = %e, "virtual user crashed");
                    errors.push(format!("worker {id} crashed: {e}"));
                }
            }
        }

        let results = collector.await.unwrap_or_else(|e| {
            error!(error = %e, "result collector crashed");
            Vec::new()
        });
        let end_time = Utc::now();

        let metrics = metrics::aggregate(&results, start_time, end_time);
        let iterations = reports.iter().map(|r| r.iterations).sum();
        let summary = metrics::summarize(
            &results,
            &metrics,
            start_time,
            end_time,
            config.concurrency,
            iterations,
        );
        let threshold_results = thresholds::evaluate(&config.thresholds, &metrics, &summary);
        let success = errors.is_empty() && thresholds::all_passed(&threshold_results);

        info!(
            total_requests = summary.total_requests,
            error_rate = summary.error_rate,
            rps = summary.requests_per_second,
            success,
            "load test finished"
        );

        PerformanceResult {
            test_id,
            success,
            start_time,
            end_time,
            summary,
            metrics,
            threshold_results,
            errors,
            request_errors: results.into_iter().filter(|r| !r.success).collect(),
            validation_failures: reports.into_iter().flat_map(|r| r.validation_failures).collect(),
        }
    }

    async fn resolve_auth(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        match &self.config.auth_profile {
            None => Ok(BTreeMap::new()),
            Some(profile) => self
                .auth
                .resolve(profile)
                .await
                .map_err(|e| ConfigError::AuthProfile(e.to_string())),
        }
    }
}

/// Append-only sink fed by every worker; returns the results once all senders are gone.
async fn collect(mut rx: mpsc::UnboundedReceiver<RequestResult>) -> Vec<RequestResult> {
    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    results
}

/// Run `config` with the default collaborators.
pub async fn run_test(config: TestConfig) -> PerformanceResult {
    LoadTest::new(config).run().await
}
