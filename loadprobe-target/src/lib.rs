//! Minimal HTTP target for exercising the load engine: every route answers
//! with a configured status after a configured delay.

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub mod config;
pub use config::{RouteConfig, RoutesFile, TargetConfig};

/// Shared handler state: the route table plus a hit counter per `METHOD path`.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<BTreeMap<String, RouteConfig>>,
    pub fallback: RouteConfig,
    pub hits: Arc<RwLock<HashMap<String, u64>>>,
}

impl AppState {
    pub fn new(routes: BTreeMap<String, RouteConfig>, fallback: RouteConfig) -> Self {
        Self { routes: Arc::new(routes), fallback, hits: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Route for a request: `METHOD path` first, then the bare path, then the fallback.
    pub fn route_for(&self, method: &Method, path: &str) -> &RouteConfig {
        self.routes
            .get(&format!("{method} {path}"))
            .or_else(|| self.routes.get(path))
            .unwrap_or(&self.fallback)
    }

    pub async fn hits_for(&self, key: &str) -> u64 {
        self.hits.read().await.get(key).copied().unwrap_or(0)
    }
}

pub struct Target {
    config: TargetConfig,
}

impl Target {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Every path and method goes through [`handle_request`].
    pub fn create_router(state: AppState) -> Router {
        Router::new().fallback(handle_request).with_state(state)
    }

    /// Run the target, signalling `ready_tx` with the bound address once accepting connections.
    pub async fn run(
        self,
        ready_tx: tokio::sync::oneshot::Sender<SocketAddr>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let state = AppState::new(self.config.routes, self.config.fallback);
        let app = Self::create_router(state);
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "target listening");
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).await?;
        Ok(())
    }
}

pub async fn handle_request(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let path = uri.path().to_string();
    *state.hits.write().await.entry(format!("{method} {path}")).or_insert(0) += 1;

    let route = state.route_for(&method, &path).clone();
    if route.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(route.delay_ms)).await;
    }
    debug!(%method, %path, status = route.status, "answered");

    let status = StatusCode::from_u16(route.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match route.body {
        Some(body) => (status, body).into_response(),
        None => status.into_response(),
    }
}
