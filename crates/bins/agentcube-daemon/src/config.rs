use std::env;

/// Default session TTL if the pod's environment doesn't override it (§4.3).
pub const DEFAULT_TTL_SECS: i64 = 900;
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "agentcube-daemon")]
pub struct Config {
    #[arg(long, env = "AGENTCUBE_DAEMON_LISTEN", default_value = "0.0.0.0:9527")]
    pub listen: String,

    /// PEM of the bootstrap public key this Daemon trusts for `/init`
    /// (§4.4 step 1; "mounted file or environment variable").
    #[arg(long, env = "PICOD_AUTH_PUBLIC_KEY")]
    pub bootstrap_public_key_pem: String,

    /// `bootstrap` runs the `/init` handshake; `static` installs
    /// `session_public_key_pem` directly at startup and never accepts
    /// `/init` (§9 Open Question resolution in SPEC_FULL.md §4).
    #[arg(long, env = "PICOD_AUTH_MODE", default_value = "bootstrap")]
    pub auth_mode: String,

    #[arg(long, env = "AGENTCUBE_SESSION_PUBLIC_KEY")]
    pub session_public_key_pem: Option<String>,

    #[arg(long, env = "AGENTCUBE_SESSION_TTL_SECS", default_value_t = DEFAULT_TTL_SECS)]
    pub ttl_secs: i64,

    #[arg(long, env = "AGENTCUBE_CLOCK_SKEW_SECS", default_value_t = DEFAULT_CLOCK_SKEW_SECS)]
    pub clock_skew_secs: i64,

    /// Session working directory root; all relative paths in `/api/files`
    /// resolve under here (§4.3).
    #[arg(long, env = "AGENTCUBE_SESSION_ROOT", default_value = "/workspace")]
    pub session_root: String,
}

impl Config {
    #[must_use]
    pub fn is_static_auth(&self) -> bool {
        self.auth_mode == "static"
    }
}
