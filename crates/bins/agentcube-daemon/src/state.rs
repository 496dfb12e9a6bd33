use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use agentcube_signing::Verifier;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};

use crate::config::Config;

/// Shared Daemon state (C3). The session verification key is installed
/// exactly once by `/init` and read on every `/api/*` request thereafter —
/// `ArcSwapOption` gives that hot path a lock-free read. `initialized` gates
/// the one-shot install atomically so two racing `/init` calls can't both
/// believe they won (§8 invariant 4).
pub struct AppState {
    pub bootstrap_verifier: Verifier,
    pub session_verifier: ArcSwapOption<Verifier>,
    initialized: AtomicBool,
    pub last_activity_at: Mutex<DateTime<Utc>>,
    pub ttl_secs: i64,
    pub clock_skew_secs: i64,
    pub session_root: std::path::PathBuf,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Arc<Self>> {
        let bootstrap_verifier = Verifier::from_public_key_pem(&config.bootstrap_public_key_pem)
            .map_err(|e| anyhow::anyhow!("invalid bootstrap public key: {e}"))?;

        let (session_verifier, initialized) = if config.is_static_auth() {
            let pem = config
                .session_public_key_pem
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("static auth mode requires a session public key"))?;
            let verifier = Verifier::from_public_key_pem(pem)
                .map_err(|e| anyhow::anyhow!("invalid session public key: {e}"))?;
            (ArcSwapOption::from_pointee(verifier), true)
        } else {
            (ArcSwapOption::empty(), false)
        };

        Ok(Arc::new(Self {
            bootstrap_verifier,
            session_verifier,
            initialized: AtomicBool::new(initialized),
            last_activity_at: Mutex::new(Utc::now()),
            ttl_secs: config.ttl_secs,
            clock_skew_secs: config.clock_skew_secs,
            session_root: std::path::PathBuf::from(&config.session_root),
        }))
    }

    /// `true` if a session key has been installed (via `/init` or static
    /// config) — `/api/*` is only reachable once this is true.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Install the session verification key. Returns `false` if a key was
    /// already installed (§8 invariant 4: exactly one successful `/init`).
    pub fn install_session_key(&self, verifier: Verifier) -> bool {
        let won = self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.session_verifier.store(Some(Arc::new(verifier)));
        }
        won
    }

    /// Mark activity now. `lastActivityAt` only ever moves forward (§8
    /// invariant 6).
    pub fn touch(&self) {
        let mut guard = self.last_activity_at.lock().expect("lock poisoned");
        let now = Utc::now();
        if now > *guard {
            *guard = now;
        }
    }

    #[must_use]
    pub fn ttl_remaining_seconds(&self) -> i64 {
        let guard = self.last_activity_at.lock().expect("lock poisoned");
        let elapsed = (Utc::now() - *guard).num_seconds();
        (self.ttl_secs - elapsed).max(0)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.ttl_remaining_seconds() == 0
    }
}
