use chrono::Utc;
use loadprobe_common::{RequestResult, Scenario, ScenarioStep, ValidationFailure};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::executor::RequestExecutor;
use crate::progress::{ProgressEvent, ProgressSender};
use crate::selector::EndpointSelector;

/// What a virtual user does on each iteration.
#[derive(Debug, Clone)]
pub enum Workload {
    /// Pick one endpoint per iteration.
    Load(Arc<EndpointSelector>),
    /// Run every step in order per iteration.
    Scenario(Arc<Scenario>),
}

/// State shared read-only by every virtual user in a run.
pub struct WorkerContext {
    pub executor: Arc<RequestExecutor>,
    pub workload: Workload,
    /// The single global deadline. Checked only between iterations.
    pub stop_at: Instant,
    /// Pause between load-mode iterations.
    pub pacing: Duration,
    pub results: mpsc::UnboundedSender<RequestResult>,
    pub progress: Option<ProgressSender>,
    pub cancel: CancellationToken,
}

/// What a virtual user reports once it stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerReport {
    pub worker: u32,
    pub requests: u64,
    pub iterations: u64,
    pub validation_failures: Vec<ValidationFailure>,
}

pub struct VirtualUser {
    id: u32,
    start_delay: Duration,
    rng: StdRng,
    ctx: Arc<WorkerContext>,
    report: WorkerReport,
}

impl VirtualUser {
    pub fn new(id: u32, start_delay: Duration, rng: StdRng, ctx: Arc<WorkerContext>) -> Self {
        Self {
            id,
            start_delay,
            rng,
            ctx,
            report: WorkerReport { worker: id, ..WorkerReport::default() },
        }
    }

    /// Wait out the ramp-up delay, then loop until the deadline passes or the
    /// run is cancelled. An in-flight request always runs to completion.
    pub async fn run(mut self) -> WorkerReport {
        let begin_at = Instant::now()
            .checked_add(self.start_delay)
            .map_or(self.ctx.stop_at, |at| at.min(self.ctx.stop_at));
        tokio::select! {
            _ = sleep_until(begin_at) => {}
            _ = self.ctx.cancel.cancelled() => {}
        }

        if self.should_stop() {
            debug!(worker = self.id, "deadline reached before start");
            return self.report;
        }

        debug!(worker = self.id, delay_ms = self.start_delay.as_millis() as u64, "virtual user started");
        self.emit(ProgressEvent::WorkerStarted { worker: self.id });

        match self.ctx.workload.clone() {
            Workload::Load(selector) => self.run_load(&selector).await,
            Workload::Scenario(scenario) => self.run_scenario(&scenario).await,
        }

        debug!(
            worker = self.id,
            requests = self.report.requests,
            iterations = self.report.iterations,
            "virtual user finished"
        );
        self.emit(ProgressEvent::WorkerFinished {
            worker: self.id,
            requests: self.report.requests,
            iterations: self.report.iterations,
        });
        self.report
    }

    async fn run_load(&mut self, selector: &EndpointSelector) {
        while !self.should_stop() {
            let endpoint = selector.select(&mut self.rng);
            let result = self.ctx.executor.execute(endpoint.into()).await;
            self.record(result);
            self.pause(self.ctx.pacing).await;
        }
    }

    async fn run_scenario(&mut self, scenario: &Scenario) {
        while !self.should_stop() {
            for step in &scenario.steps {
                if self.ctx.cancel.is_cancelled() {
                    return;
                }

                let result = self.ctx.executor.execute(step.into()).await;
                if let Some(message) = check_step(step, &result) {
                    self.validation_failed(&scenario.name, step, message);
                }
                self.record(result);

                if let Some(delay_ms) = step.delay_ms {
                    self.pause(Duration::from_millis(delay_ms)).await;
                }
            }
            self.report.iterations += 1;
        }
    }

    fn should_stop(&self) -> bool {
        self.ctx.cancel.is_cancelled() || Instant::now() >= self.ctx.stop_at
    }

    async fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::select! {
            _ = sleep(duration) => {}
            _ = self.ctx.cancel.cancelled() => {}
        }
    }

    fn record(&mut self, result: RequestResult) {
        self.report.requests += 1;
        self.emit(ProgressEvent::RequestCompleted { worker: self.id, result: result.clone() });
        // The collector only goes away once every worker has been joined.
        let _ = self.ctx.results.send(result);
    }

    fn validation_failed(&mut self, scenario: &str, step: &ScenarioStep, message: String) {
        warn!(
            worker = self.id,
            scenario,
            step = %step.name,
            iteration = self.report.iterations,
            "step validation failed: {message}"
        );
        let failure = ValidationFailure {
            worker: self.id,
            iteration: self.report.iterations,
            step: step.name.clone(),
            message,
            timestamp: Utc::now(),
        };
        self.emit(ProgressEvent::ValidationFailed(failure.clone()));
        self.report.validation_failures.push(failure);
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.ctx.progress {
            let _ = progress.send(event);
        }
    }
}

/// Compare a step's result with its validation rules. Returns a description of
/// every mismatch, or `None` when the step has no rules or all of them hold.
pub fn check_step(step: &ScenarioStep, result: &RequestResult) -> Option<String> {
    let validation = step.validation.as_ref()?;
    let mut problems = Vec::new();

    if let Some(expected) = validation.expected_status {
        if result.status_code != expected {
            problems.push(format!("expected status {expected}, got {}", result.status_code));
        }
    }
    if let Some(max_ms) = validation.max_response_time_ms {
        if result.response_time_ms > max_ms {
            problems.push(format!(
                "response time {:.1} ms exceeded {max_ms} ms",
                result.response_time_ms
            ));
        }
    }

    if problems.is_empty() {
        None
    } else {
        Some(problems.join("; "))
    }
}
