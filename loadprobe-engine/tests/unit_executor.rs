mod support;

use loadprobe_client::{Client, ClientConfig};
use loadprobe_common::{Endpoint, HttpMethod, LoadProbeError, ScenarioStep};
use loadprobe_engine::executor::RequestExecutor;
use mockito::Matcher;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use support::FakeTransport;

fn executor_with(transport: Arc<FakeTransport>, base_url: &str) -> RequestExecutor {
    RequestExecutor::new(transport, base_url, BTreeMap::new(), BTreeMap::new(), Duration::from_secs(5))
}

#[test]
fn test_build_url_joins_with_single_slash() {
    let transport = Arc::new(FakeTransport::new(200, Duration::ZERO));
    let executor = executor_with(transport.clone(), "http://api.local/v1/");
    assert_eq!(executor.build_url("/users"), "http://api.local/v1/users");
    assert_eq!(executor.build_url("users"), "http://api.local/v1/users");
    assert_eq!(executor.build_url("/"), "http://api.local/v1/");
}

#[test]
fn test_header_precedence() {
    let transport = Arc::new(FakeTransport::new(200, Duration::ZERO));
    let run_headers = BTreeMap::from([
        ("X-Env".to_string(), "load".to_string()),
        ("authorization".to_string(), "Basic run".to_string()),
    ]);
    let auth = BTreeMap::from([("Authorization".to_string(), "Bearer resolved".to_string())]);
    let executor = RequestExecutor::new(transport, "http://api.local", run_headers, auth, Duration::from_secs(1));

    let mut endpoint = Endpoint::new(HttpMethod::Get, "/me");
    endpoint.headers.insert("X-Env".to_string(), "endpoint".to_string());
    let request = executor.build_request((&endpoint).into());

    assert_eq!(request.headers.get("X-Env").map(String::as_str), Some("endpoint"));
    assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer resolved"));
    assert!(!request.headers.contains_key("authorization"));
    assert_eq!(request.timeout, Duration::from_secs(1));
}

#[tokio::test]
async fn test_success_result() {
    let transport = Arc::new(FakeTransport::new(204, Duration::from_millis(5)));
    let executor = executor_with(transport.clone(), "http://api.local");

    let endpoint = Endpoint::new(HttpMethod::Delete, "/items/1");
    let result = executor.execute((&endpoint).into()).await;

    assert!(result.success);
    assert_eq!(result.status_code, 204);
    assert_eq!(result.endpoint, "/items/1");
    assert_eq!(result.method, HttpMethod::Delete);
    assert!(result.response_time_ms >= 4.0, "took {}", result.response_time_ms);
    assert!(result.end_time >= result.start_time);
    assert_eq!(transport.paths(), vec!["http://api.local/items/1".to_string()]);
}

#[tokio::test]
async fn test_http_error_status_is_failure_without_message() {
    let transport = Arc::new(FakeTransport::new(500, Duration::ZERO));
    let executor = executor_with(transport, "http://api.local");

    let step = ScenarioStep::new("checkout", HttpMethod::Post, "/checkout");
    let result = executor.execute((&step).into()).await;

    assert!(!result.success);
    assert_eq!(result.status_code, 500);
    assert_eq!(result.error, None);
}

#[tokio::test]
async fn test_transport_error_becomes_status_zero() {
    let transport = Arc::new(FakeTransport::failing(LoadProbeError::Timeout(100)));
    let executor = executor_with(transport, "http://api.local");

    let endpoint = Endpoint::new(HttpMethod::Get, "/slow");
    let result = executor.execute((&endpoint).into()).await;

    assert_eq!(result.status_code, 0);
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Request timed out after 100 ms"));
}

#[tokio::test]
async fn test_real_client_against_mock_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("q".into(), "rust".into()))
        .match_header("authorization", "Bearer t")
        .with_status(200)
        .create_async()
        .await;

    let client = Arc::new(Client::new(ClientConfig::default()).unwrap());
    let auth = BTreeMap::from([("Authorization".to_string(), "Bearer t".to_string())]);
    let executor = RequestExecutor::new(client, &server.url(), BTreeMap::new(), auth, Duration::from_secs(5));

    let mut endpoint = Endpoint::new(HttpMethod::Get, "/search");
    endpoint.query.insert("q".to_string(), "rust".to_string());
    let result = executor.execute((&endpoint).into()).await;

    assert!(result.success, "unexpected result: {result:?}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_connection_refused_never_panics() {
    let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let client = Arc::new(Client::new(ClientConfig::default()).unwrap());
    let executor = RequestExecutor::new(
        client,
        &format!("http://127.0.0.1:{port}"),
        BTreeMap::new(),
        BTreeMap::new(),
        Duration::from_secs(2),
    );

    let endpoint = Endpoint::new(HttpMethod::Get, "/");
    let result = executor.execute((&endpoint).into()).await;

    assert_eq!(result.status_code, 0);
    assert!(result.error.as_deref().unwrap_or_default().starts_with("Network error"));
}
