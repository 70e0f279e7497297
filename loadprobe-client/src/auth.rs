use async_trait::async_trait;
use loadprobe_common::{LoadProbeError, Result};
use std::collections::{BTreeMap, HashMap};

/// Turns an opaque auth profile reference into headers merged into every request.
#[async_trait]
pub trait AuthResolver: Send + Sync {
    async fn resolve(&self, profile: &str) -> Result<BTreeMap<String, String>>;
}

/// In-memory profile table. Unknown profiles resolve to
/// [`LoadProbeError::AuthProfileNotFound`].
#[derive(Debug, Clone, Default)]
pub struct StaticAuthResolver {
    profiles: HashMap<String, BTreeMap<String, String>>,
}

impl StaticAuthResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, name: impl Into<String>, headers: BTreeMap<String, String>) -> Self {
        self.profiles.insert(name.into(), headers);
        self
    }

    /// Register a profile that sends `Authorization: Bearer <token>`.
    pub fn with_bearer(self, name: impl Into<String>, token: &str) -> Self {
        let headers = BTreeMap::from([("Authorization".to_string(), format!("Bearer {token}"))]);
        self.with_profile(name, headers)
    }
}

#[async_trait]
impl AuthResolver for StaticAuthResolver {
    async fn resolve(&self, profile: &str) -> Result<BTreeMap<String, String>> {
        self.profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| LoadProbeError::AuthProfileNotFound(profile.to_string()))
    }
}
