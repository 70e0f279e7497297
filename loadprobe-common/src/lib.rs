use thiserror::Error;

pub mod config;
pub mod result;

pub use config::{
    Endpoint, HttpMethod, RequestBody, Scenario, ScenarioStep, StepValidation, TestConfig,
    Thresholds, DEFAULT_PACING_MS, DEFAULT_TIMEOUT_MS, MAX_WINDOW_SECS,
};
pub use result::{
    DistributionBucket, EndpointStats, ErrorBreakdown, ErrorTimelinePoint, PerformanceMetrics,
    PerformanceResult, RequestResult, ResponseTimeStats, TestSummary, ThresholdResult,
    ThroughputPoint, ThroughputStats, ValidationFailure,
};

/// Problems found in a [`TestConfig`] before any virtual user starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("baseURL is required")]
    MissingBaseUrl,

    #[error("baseURL must be an absolute http(s) URL: {0}")]
    InvalidBaseUrl(String),

    #[error("concurrency must be greater than 0")]
    InvalidConcurrency,

    #[error("duration must be greater than 0")]
    InvalidDuration,

    #[error("scenario {0:?} must contain at least one step")]
    EmptyScenario(String),

    #[error("endpoint {path:?} has weight {weight}; weights must be at least 1")]
    InvalidWeight { path: String, weight: u32 },

    #[error("endpoint and step paths must not be empty")]
    EmptyPath,

    #[error("test window of {secs} s exceeds the maximum of {max} s")]
    WindowTooLong { secs: u64, max: u64 },

    #[error("auth profile could not be resolved: {0}")]
    AuthProfile(String),
}

/// Errors raised by the HTTP and auth collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadProbeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header {0}")]
    InvalidHeader(String),

    #[error("Auth profile not found: {0}")]
    AuthProfileNotFound(String),
}

/// Result type for collaborator operations
pub type Result<T> = std::result::Result<T, LoadProbeError>;
