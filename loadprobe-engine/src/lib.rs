//! Load-test engine: virtual users drive weighted endpoints or scripted
//! scenarios against a target for a fixed window, then the collected results
//! are aggregated and scored against thresholds.

pub mod executor;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod selector;
pub mod thresholds;
pub mod worker;

pub use orchestrator::{deadline_after, run_test, start_delay, LoadTest};
pub use progress::ProgressEvent;
