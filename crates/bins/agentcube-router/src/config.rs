/// Router configuration (§6 env vars, `ROUTER_URL`/`API_TOKEN` are consumed
/// by the *other* side — this binary is the Router itself, so it exposes
/// its own listen address and upstream collaborators instead).
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "agentcube-router")]
pub struct Config {
    #[arg(long, env = "AGENTCUBE_ROUTER_LISTEN", default_value = "0.0.0.0:9090")]
    pub listen: String,

    /// Base URL of the Control-Plane Manager, used to resolve a
    /// `sessionId` to a Daemon endpoint when not already cached (§4.7).
    #[arg(long, env = "WORKLOAD_MANAGER_URL", default_value = "http://localhost:8080")]
    pub control_plane_url: String,

    /// How long a resolved session -> endpoint mapping stays valid before
    /// the Router re-consults the Control-Plane (§4.7, §9).
    #[arg(long, env = "AGENTCUBE_ROUTER_CACHE_TTL_SECS", default_value_t = 30)]
    pub cache_ttl_secs: i64,

    /// RSA private key (PEM) the Router uses to sign on behalf of legacy
    /// clients that don't sign their own requests (§4.7, §4.4 step 5(b)).
    /// Empty disables legacy re-signing — such clients get 401 from the
    /// Daemon instead.
    #[arg(long, env = "AGENTCUBE_ROUTER_SIGNING_KEY")]
    pub signing_private_key_pem: Option<String>,

    /// How long the Router waits for a `Pending` session to become
    /// `Running` before returning 503 on a CONNECT request (§4.7).
    #[arg(long, env = "AGENTCUBE_ROUTER_CONNECT_WAIT_SECS", default_value_t = 30)]
    pub connect_wait_secs: u64,

    /// Clock skew tolerance when verifying a `CONNECT` tunnel's bearer
    /// token against the session's public key (§4.6 step 4, §4.7).
    #[arg(long, env = "AGENTCUBE_ROUTER_CLOCK_SKEW_SECS", default_value_t = 30)]
    pub clock_skew_secs: i64,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        <Self as clap::Parser>::parse()
    }
}
