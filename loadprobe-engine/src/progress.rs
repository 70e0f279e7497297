use loadprobe_common::{RequestResult, ValidationFailure};
use tokio::sync::mpsc;

/// Live notifications from running virtual users. Each event is sent by the
/// worker that produced it, at the moment it happens, so per-worker order is
/// preserved; events from different workers interleave freely.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    WorkerStarted { worker: u32 },
    RequestCompleted { worker: u32, result: RequestResult },
    ValidationFailed(ValidationFailure),
    WorkerFinished { worker: u32, requests: u64, iterations: u64 },
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

pub fn channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}
