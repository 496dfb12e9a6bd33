use agentcube_signing::Signer;
use chrono::Utc;

use crate::error::ApiError;

/// Runs the one-shot Session Bootstrap Protocol against a freshly-ready
/// Daemon (C4, §4.4): mint a bootstrap JWT carrying the session's fresh
/// public key, POST it to `/init`, and report success.
///
/// The bootstrap key pair is provisioned once, at control-plane startup;
/// this struct only holds the signer derived from its private half.
pub struct Bootstrapper {
    signer: Signer,
    http: reqwest::Client,
}

impl Bootstrapper {
    pub fn new(issuer: &str, bootstrap_private_key_pem: &str) -> Result<Self, ApiError> {
        let signer = Signer::from_pkcs8_pem(issuer, bootstrap_private_key_pem)
            .map_err(|_| ApiError::Configuration("invalid bootstrap private key".into()))?;
        Ok(Self {
            signer,
            http: reqwest::Client::new(),
        })
    }

    /// POST the bootstrap token to `{daemon_base_url}/init`, installing
    /// `session_public_key_pem` as the Daemon's verification key (§4.4 steps
    /// 3–4). Errors are surfaced as `Provider` (network/HTTP failure) since
    /// by this point the pod is presumed to exist and ready.
    pub async fn run(
        &self,
        daemon_base_url: &str,
        session_public_key_pem: &str,
    ) -> Result<(), ApiError> {
        let token = self
            .signer
            .sign_bootstrap(session_public_key_pem, Utc::now())
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("failed to sign bootstrap token")))?;

        let url = format!("{}/init", daemon_base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| ApiError::Provider(format!("bootstrap POST /init failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::Provider(format!(
                "daemon rejected bootstrap: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}
