use chrono::Utc;
use loadprobe_client::{HttpRequest, HttpTransport};
use loadprobe_common::{Endpoint, HttpMethod, RequestBody, RequestResult, ScenarioStep};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// The parts of an endpoint or scenario step that describe the request itself.
#[derive(Debug, Clone, Copy)]
pub struct RequestTarget<'a> {
    pub method: HttpMethod,
    pub path: &'a str,
    pub query: &'a BTreeMap<String, String>,
    pub body: Option<&'a RequestBody>,
    pub headers: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a Endpoint> for RequestTarget<'a> {
    fn from(endpoint: &'a Endpoint) -> Self {
        Self {
            method: endpoint.method,
            path: &endpoint.path,
            query: &endpoint.query,
            body: endpoint.body.as_ref(),
            headers: &endpoint.headers,
        }
    }
}

impl<'a> From<&'a ScenarioStep> for RequestTarget<'a> {
    fn from(step: &'a ScenarioStep) -> Self {
        Self {
            method: step.method,
            path: &step.path,
            query: &step.query,
            body: step.body.as_ref(),
            headers: &step.headers,
        }
    }
}

/// Issues one request per call and turns whatever happens into a [`RequestResult`].
///
/// Header precedence, lowest to highest: run-wide headers, per-request headers,
/// resolved auth headers.
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    headers: BTreeMap<String, String>,
    auth_headers: BTreeMap<String, String>,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        headers: BTreeMap<String, String>,
        auth_headers: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            headers,
            auth_headers,
            timeout,
        }
    }

    /// Join the base URL and a request path with exactly one `/` between them.
    pub fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn build_request(&self, target: RequestTarget<'_>) -> HttpRequest {
        let mut request = HttpRequest::new(target.method, self.build_url(target.path), self.timeout);
        request.query = target
            .query
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        request.headers = self.headers.clone();
        merge_headers(&mut request.headers, target.headers);
        merge_headers(&mut request.headers, &self.auth_headers);
        request.body = target.body.cloned();
        request
    }

    /// Perform the request. Never fails: transport errors come back as a
    /// result with status 0 and the error message.
    pub async fn execute(&self, target: RequestTarget<'_>) -> RequestResult {
        let request = self.build_request(target);

        let start_time = Utc::now();
        let outcome = self.transport.send(request).await;
        let end_time = Utc::now();

        match outcome {
            Ok(response) => {
                RequestResult::completed(target.method, target.path, start_time, end_time, response.status)
            }
            Err(e) => RequestResult::failed(target.method, target.path, start_time, end_time, e.to_string()),
        }
    }
}

/// Header names are case-insensitive, so an override replaces any spelling of the same name.
fn merge_headers(into: &mut BTreeMap<String, String>, from: &BTreeMap<String, String>) {
    for (name, value) in from {
        into.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        into.insert(name.clone(), value.clone());
    }
}
