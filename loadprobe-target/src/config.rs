use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// How the target answers one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub status: u16,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl RouteConfig {
    pub fn new(status: u16, delay_ms: u64) -> Self {
        Self { status, delay_ms, body: None }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self::new(200, 0)
    }
}

/// Target configuration.
///
/// Route keys are either a bare path (`/ok`) or a method and path (`POST /login`);
/// the method-qualified key wins when both match.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub address: SocketAddr,
    pub routes: BTreeMap<String, RouteConfig>,
    /// Used for any request no route matches.
    pub fallback: RouteConfig,
}

impl TargetConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self { address, routes: BTreeMap::new(), fallback: RouteConfig::default() }
    }

    pub fn with_route(mut self, key: impl Into<String>, route: RouteConfig) -> Self {
        self.routes.insert(key.into(), route);
        self
    }

    pub fn with_fallback(mut self, fallback: RouteConfig) -> Self {
        self.fallback = fallback;
        self
    }
}

/// On-disk form read by the `loadprobe-target` binary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutesFile {
    #[serde(default)]
    pub routes: BTreeMap<String, RouteConfig>,
    #[serde(default)]
    pub fallback: Option<RouteConfig>,
}
