use agentcube_types::{Session, SessionId};
use serde::Serialize;

use crate::error::{Result, error_from_response};

/// Thin HTTP client over the Control-Plane Manager's session API (C5,
/// `WORKLOAD_MANAGER_URL`), used by the high-level [`crate::SessionClient`]
/// to create, look up, and delete sessions.
#[derive(Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    name: &'a str,
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_key: Option<&'a str>,
    metadata: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct CreateSessionResponse {
    session_id: SessionId,
}

impl ControlPlaneClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// `POST /v1/code-interpreter` (§6): create a Code Interpreter session,
    /// passing the SDK-generated `public_key` so the Daemon's bootstrap
    /// handshake is skipped (§4.4/§9's "publicKey present" resolution).
    pub async fn create_code_interpreter(
        &self,
        name: &str,
        namespace: &str,
        ttl_secs: Option<i64>,
        public_key: &str,
        metadata: serde_json::Value,
    ) -> Result<SessionId> {
        self.create("/v1/code-interpreter", name, namespace, ttl_secs, Some(public_key), metadata)
            .await
    }

    /// `POST /v1/agent-runtime` (§6 "first call without session header"):
    /// Agent Runtime sessions never bootstrap, so no public key is sent.
    pub async fn create_agent_runtime(
        &self,
        name: &str,
        namespace: &str,
        ttl_secs: Option<i64>,
        metadata: serde_json::Value,
    ) -> Result<SessionId> {
        self.create("/v1/agent-runtime", name, namespace, ttl_secs, None, metadata).await
    }

    async fn create(
        &self,
        path: &str,
        name: &str,
        namespace: &str,
        ttl_secs: Option<i64>,
        public_key: Option<&str>,
        metadata: serde_json::Value,
    ) -> Result<SessionId> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let body = CreateSessionRequest { name, namespace, ttl_secs, public_key, metadata };
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &text));
        }
        let created: CreateSessionResponse = response.json().await?;
        Ok(created.session_id)
    }

    /// `GET /v1/code-interpreter/sessions/{sessionId}` (§6 supplement).
    pub async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        let url = format!(
            "{}/v1/code-interpreter/sessions/{session_id}",
            self.base_url.trim_end_matches('/')
        );
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &text));
        }
        Ok(response.json().await?)
    }

    /// `DELETE /v1/code-interpreter/sessions/{sessionId}` (§6): idempotent,
    /// 404 is treated as success by well-behaved clients — so is this one.
    pub async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        let url = format!(
            "{}/v1/code-interpreter/sessions/{session_id}",
            self.base_url.trim_end_matches('/')
        );
        let response = self.http.delete(&url).send().await?;
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(error_from_response(status, &text))
    }
}
