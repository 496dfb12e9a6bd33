use serde::Deserialize;

use crate::error::RouterError;

/// The fields of [`agentcube_types::Session`] the Router actually needs —
/// kept separate from the control-plane's own `Session` type so this crate
/// doesn't need the control-plane's Postgres/kube dependency stack just to
/// parse a JSON response (§4.7).
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub state: String,
    pub endpoint: Option<String>,
    /// The session's verification key (§3 `sessionPublicKey`), used by the
    /// Router to authenticate a `CONNECT` tunnel before splicing it (§4.7).
    /// Absent for Agent Runtime sessions, which don't use the bootstrap
    /// handshake (§4.5), and for responses that predate this field.
    #[serde(default)]
    pub session_public_key: Option<String>,
}

/// Thin HTTP client over the Control-Plane Manager's session API (C5),
/// used by the Router to resolve a `sessionId` to a Daemon endpoint and, for
/// the Agent Runtime invocation path, to mint a fresh session on first
/// contact (§4.7, §6 "first call without session header returns a fresh
/// session id").
#[derive(Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControlPlaneClient {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionInfo, RouterError> {
        let url = format!(
            "{}/v1/code-interpreter/sessions/{session_id}",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RouterError::Internal(anyhow::anyhow!("control-plane lookup failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RouterError::UnknownSession(session_id.to_owned()));
        }
        if !response.status().is_success() {
            return Err(RouterError::BackendRefused);
        }
        response
            .json()
            .await
            .map_err(|e| RouterError::Internal(anyhow::anyhow!("malformed session response: {e}")))
    }

    /// Create (or idempotently re-attach to) an Agent Runtime session for
    /// `namespace`/`name`, used on a first invocation that carries no
    /// `x-agentcube-session-id` header (§6).
    pub async fn create_agent_runtime_session(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<SessionInfo, RouterError> {
        let url = format!("{}/v1/agent-runtime", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "name": name,
            "namespace": namespace,
        });
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RouterError::Internal(anyhow::anyhow!("control-plane create failed: {e}")))?;
        if !response.status().is_success() {
            return Err(RouterError::BackendRefused);
        }
        #[derive(Deserialize)]
        struct CreateResponse {
            session_id: String,
        }
        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| RouterError::Internal(anyhow::anyhow!("malformed create response: {e}")))?;
        self.get_session(&created.session_id).await
    }
}
