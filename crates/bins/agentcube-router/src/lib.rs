pub mod cache;
pub mod config;
pub mod connect;
pub mod control_plane;
pub mod error;
pub mod proxy;
pub mod routes;
pub mod sign;

use std::sync::Arc;
use std::time::Duration;

use agentcube_signing::Signer;

pub use config::Config;

use crate::cache::EndpointCache;
use crate::control_plane::ControlPlaneClient;

/// Shared Router state (C8): the endpoint cache, the Control-Plane client
/// used on a cache miss, the plain HTTP client used for the forwarding leg,
/// and an optional Signer for legacy (unsigned) clients.
pub struct AppState {
    pub cache: EndpointCache,
    pub control_plane: ControlPlaneClient,
    pub http: reqwest::Client,
    pub legacy_signer: Option<Signer>,
    pub connect_wait: Duration,
    pub clock_skew_secs: i64,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Arc<Self>> {
        let legacy_signer = config
            .signing_private_key_pem
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|pem| Signer::from_pkcs8_pem("agentcube-router", pem))
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid router signing key: {e}"))?;

        Ok(Arc::new(Self {
            cache: EndpointCache::new(Duration::from_secs(config.cache_ttl_secs.max(1) as u64)),
            control_plane: ControlPlaneClient::new(config.control_plane_url.clone()),
            http: reqwest::Client::new(),
            legacy_signer,
            connect_wait: Duration::from_secs(config.connect_wait_secs),
            clock_skew_secs: config.clock_skew_secs,
        }))
    }
}

/// Periodically evict stale entries from the endpoint cache (§4.7, §9
/// background eviction note).
pub async fn run_cache_sweeper(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        state.cache.sweep_expired();
    }
}
