use async_trait::async_trait;
use loadprobe_common::{HttpMethod, LoadProbeError, RequestBody, Result};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::trace;
use uuid::Uuid;

pub mod auth;

pub use auth::{AuthResolver, StaticAuthResolver};

/// Header carrying a fresh UUID on every request so target-side logs can be correlated.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A fully resolved request, ready to put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL without the query string.
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            timeout,
        }
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

/// What came back from the target. Any status, including 4xx/5xx, is a response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// Performs one HTTP exchange. Errors are transport-level only.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("loadprobe/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// reqwest-backed [`HttpTransport`]. One instance is shared by all virtual users
/// so they reuse the same connection pool.
pub struct Client {
    pub config: ClientConfig,
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LoadProbeError::NetworkError(e.to_string()))?;
        Ok(Self { config, http_client })
    }

    fn build(&self, request: HttpRequest) -> Result<reqwest::RequestBuilder> {
        let mut builder = self
            .http_client
            .request(to_reqwest_method(request.method), &request.url)
            .timeout(request.timeout)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| LoadProbeError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| LoadProbeError::InvalidHeader(name.to_string()))?;
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            if !request.has_header(CONTENT_TYPE.as_str()) {
                builder = builder.header(CONTENT_TYPE, body.content_type());
            }
            builder = builder.body(body.to_bytes());
        }

        Ok(builder)
    }
}

#[async_trait]
impl HttpTransport for Client {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let timeout = request.timeout;
        let method = request.method;
        let url = request.url.clone();
        let builder = self.build(request)?;

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| map_reqwest_error(e, timeout))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        let elapsed = started.elapsed();

        trace!(%method, %url, status, elapsed_ms = elapsed.as_millis() as u64, "response received");
        Ok(HttpResponse { status, body: body.to_vec(), elapsed })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> LoadProbeError {
    if error.is_timeout() {
        LoadProbeError::Timeout(timeout.as_millis() as u64)
    } else if error.is_builder() {
        LoadProbeError::InvalidUrl(error.to_string())
    } else {
        LoadProbeError::NetworkError(error.to_string())
    }
}
