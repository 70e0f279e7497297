use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::ConfigError;

/// Per-request timeout applied when the config does not set `timeoutMs`.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Pause between load-mode iterations. Keeps the local scheduler responsive;
/// it is not a throttle on the target.
pub const DEFAULT_PACING_MS: u64 = 10;

/// Upper bound on `duration + rampUp + rampDown`: 30 days.
pub const MAX_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(format!("unsupported HTTP method: {s}")),
        }
    }
}

/// Request payload. The engine never looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl RequestBody {
    /// Content type sent alongside the body unless a header overrides it.
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => "application/json",
            RequestBody::Text(_) => "text/plain; charset=utf-8",
            RequestBody::Bytes(_) => "application/octet-stream",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            RequestBody::Json(value) => value.to_string().into_bytes(),
            RequestBody::Text(text) => text.clone().into_bytes(),
            RequestBody::Bytes(bytes) => bytes.clone(),
        }
    }
}

fn default_weight() -> u32 {
    1
}

/// One target of load-mode traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default)]
    pub method: HttpMethod,
    pub path: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            weight: 1,
            query: BTreeMap::new(),
            body: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// Optional checks applied to a scenario step's response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_time_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStep {
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Pause after the step completes, before the next one starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<StepValidation>,
}

impl ScenarioStep {
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
            headers: BTreeMap::new(),
            delay_ms: None,
            validation: None,
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_validation(mut self, validation: StepValidation) -> Self {
        self.validation = Some(validation);
        self
    }
}

/// A named, ordered user workflow. One pass over `steps` is one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<ScenarioStep>,
}

/// Numeric bounds the aggregated run must satisfy. Unset keys are not evaluated.
///
/// | Key               | Unit    | Passes when        |
/// |-------------------|---------|--------------------|
/// | `avgResponseTime` | ms      | actual ≤ threshold |
/// | `maxResponseTime` | ms      | actual ≤ threshold |
/// | `p95ResponseTime` | ms      | actual ≤ threshold |
/// | `p99ResponseTime` | ms      | actual ≤ threshold |
/// | `errorRate`       | percent | actual ≤ threshold |
/// | `throughput`      | req/s   | actual ≥ threshold |
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95_response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p99_response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<f64>,
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        self == &Thresholds::default()
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_pacing_ms() -> u64 {
    DEFAULT_PACING_MS
}

/// Everything needed to drive one load test.
///
/// `scenario`, when present, takes precedence over `endpoints`. With neither,
/// the run issues `GET /` against `baseURL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    #[serde(rename = "baseURL", alias = "baseUrl", default)]
    pub base_url: String,
    pub concurrency: u32,
    /// Seconds of steady load.
    pub duration: u64,
    #[serde(default)]
    pub ramp_up: u64,
    #[serde(default)]
    pub ramp_down: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    #[serde(default, skip_serializing_if = "Thresholds::is_empty")]
    pub thresholds: Thresholds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_profile: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl TestConfig {
    pub fn new(base_url: impl Into<String>, concurrency: u32, duration: u64) -> Self {
        Self {
            base_url: base_url.into(),
            concurrency,
            duration,
            ramp_up: 0,
            ramp_down: 0,
            endpoints: Vec::new(),
            scenario: None,
            thresholds: Thresholds::default(),
            auth_profile: None,
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            pacing_ms: DEFAULT_PACING_MS,
            seed: None,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_ramp(mut self, ramp_up: u64, ramp_down: u64) -> Self {
        self.ramp_up = ramp_up;
        self.ramp_down = ramp_down;
        self
    }

    /// Check every rule and report all violations at once.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.base_url.trim().is_empty() {
            errors.push(ConfigError::MissingBaseUrl);
        } else if let Err(reason) = self.parsed_base_url() {
            errors.push(ConfigError::InvalidBaseUrl(reason));
        }
        if self.concurrency == 0 {
            errors.push(ConfigError::InvalidConcurrency);
        }
        if self.duration == 0 {
            errors.push(ConfigError::InvalidDuration);
        }
        let window_secs = self.window_secs();
        if window_secs > MAX_WINDOW_SECS {
            errors.push(ConfigError::WindowTooLong { secs: window_secs, max: MAX_WINDOW_SECS });
        }

        match &self.scenario {
            Some(scenario) => {
                if scenario.steps.is_empty() {
                    errors.push(ConfigError::EmptyScenario(scenario.name.clone()));
                }
                if scenario.steps.iter().any(|s| s.path.is_empty()) {
                    errors.push(ConfigError::EmptyPath);
                }
            }
            None => {
                for endpoint in &self.endpoints {
                    if endpoint.weight == 0 {
                        errors.push(ConfigError::InvalidWeight {
                            path: endpoint.path.clone(),
                            weight: endpoint.weight,
                        });
                    }
                }
                if self.endpoints.iter().any(|e| e.path.is_empty()) {
                    errors.push(ConfigError::EmptyPath);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Parse `base_url`, accepting only absolute http/https URLs.
    pub fn parsed_base_url(&self) -> Result<Url, String> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| format!("{}: {e}", self.base_url))?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(self.base_url.clone()),
        }
    }

    /// Endpoints used in load mode; the implicit `GET /` when none are configured.
    pub fn effective_endpoints(&self) -> Vec<Endpoint> {
        if self.endpoints.is_empty() {
            vec![Endpoint::new(HttpMethod::Get, "/")]
        } else {
            self.endpoints.clone()
        }
    }

    /// Total window `duration + rampUp + rampDown`. Ramp-down is a trailing
    /// observation period; no worker stops early.
    pub fn total_window(&self) -> Duration {
        Duration::from_secs(self.window_secs())
    }

    fn window_secs(&self) -> u64 {
        self.duration.saturating_add(self.ramp_up).saturating_add(self.ramp_down)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}
