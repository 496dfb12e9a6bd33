use std::sync::Mutex;

use agentcube_signing::{CanonicalRequest, Signer};
use agentcube_types::{SessionId, SessionState};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::control_plane::ControlPlaneClient;
use crate::error::{Result, SdkError, error_from_response};
use crate::keypair::SessionKeypair;

const SESSION_HEADER: &str = "x-agentcube-session-id";

/// Client lifecycle (§4.8):
///
/// ```text
/// [Fresh] --create()--> [Bootstrapping] --init-ok--> [Live] --close()--> [Closed]
///                                      \--init-fail--> [Failed]
/// [Live] --any-api-call-- [Live]  (each call signs a fresh JWT)
/// [Live] --server-401--> [Failed]  (do not retry)
/// ```
///
/// `[Fresh]` has no representation of its own — it's the moment before
/// [`SessionClient::create_code_interpreter`]/[`SessionClient::attach`] is
/// called. Since the Control-Plane runs readiness and bootstrap synchronously
/// inside its `createSession` call (§4.5 steps 5–6), `[Bootstrapping]` here
/// spans exactly the in-flight HTTP request to create the session — there is
/// no separate handshake for this client to drive itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Bootstrapping,
    Live,
    Failed,
    Closed,
}

/// Where to reach the Control-Plane and Router (§6 env vars
/// `WORKLOAD_MANAGER_URL`/`ROUTER_URL`).
#[derive(Debug, Clone)]
pub struct SdkConfig {
    pub control_plane_url: String,
    pub router_url: String,
}

#[derive(Debug, Clone)]
enum Flavor {
    CodeInterpreter { namespace: String, name: String },
    AgentRuntime { namespace: String, name: String },
}

/// A live session handle (C9): thin composition over the Signer (C6) and the
/// Control-Plane/Router HTTP APIs. One instance per session.
pub struct SessionClient {
    state: Mutex<LifecycleState>,
    control_plane: ControlPlaneClient,
    http: reqwest::Client,
    router_url: String,
    session_id: SessionId,
    /// `None` for the Agent Runtime flavor, which never bootstraps (§4.5
    /// "Agent Runtime does not require bootstrap").
    signer: Option<Signer>,
    flavor: Flavor,
}

#[derive(Debug, Serialize)]
struct ExecuteBody<'a> {
    command: CommandArg<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum CommandArg<'a> {
    Argv(&'a [String]),
    Shell(&'a str),
}

#[derive(Debug, Deserialize)]
pub struct ExecuteOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

impl SessionClient {
    /// Create a Code Interpreter session (§4.5, §4.8). The SDK generates its
    /// own session keypair and supplies the public half as `publicKey`, so
    /// it retains signing authority and the Daemon's bootstrap handshake is
    /// skipped server-side.
    pub async fn create_code_interpreter(
        config: &SdkConfig,
        namespace: &str,
        name: &str,
        ttl_secs: Option<i64>,
        metadata: serde_json::Value,
    ) -> Result<Self> {
        let keypair = SessionKeypair::generate()?;
        let control_plane = ControlPlaneClient::new(config.control_plane_url.clone());

        let session_id = control_plane
            .create_code_interpreter(name, namespace, ttl_secs, &keypair.public_key_pem, metadata)
            .await?;

        let signer = Signer::from_pkcs8_pem(session_id.to_string(), &keypair.private_key_pem)?;

        let client = Self {
            state: Mutex::new(LifecycleState::Bootstrapping),
            control_plane,
            http: reqwest::Client::new(),
            router_url: config.router_url.clone(),
            session_id,
            signer: Some(signer),
            flavor: Flavor::CodeInterpreter { namespace: namespace.to_owned(), name: name.to_owned() },
        };
        client.finish_construction().await
    }

    /// Create an Agent Runtime session (§4.5). No keypair is generated: this
    /// flavor never bootstraps, and invocations are unsigned by this client
    /// (authentication is the invoked agent's own responsibility, §4.5).
    pub async fn create_agent_runtime(
        config: &SdkConfig,
        namespace: &str,
        name: &str,
        ttl_secs: Option<i64>,
        metadata: serde_json::Value,
    ) -> Result<Self> {
        let control_plane = ControlPlaneClient::new(config.control_plane_url.clone());
        let session_id = control_plane.create_agent_runtime(name, namespace, ttl_secs, metadata).await?;

        let client = Self {
            state: Mutex::new(LifecycleState::Bootstrapping),
            control_plane,
            http: reqwest::Client::new(),
            router_url: config.router_url.clone(),
            session_id,
            signer: None,
            flavor: Flavor::AgentRuntime { namespace: namespace.to_owned(), name: name.to_owned() },
        };
        client.finish_construction().await
    }

    /// Attach to a session created elsewhere, skipping creation entirely and
    /// entering `[Live]` directly (§4.8 "a reusable constructor that accepts
    /// an existing `sessionId`"). The caller must already hold the session's
    /// private key PEM for the Code Interpreter flavor — the Control-Plane
    /// never returns it once generated.
    pub fn attach_code_interpreter(
        config: &SdkConfig,
        session_id: SessionId,
        namespace: &str,
        name: &str,
        session_private_key_pem: &str,
    ) -> Result<Self> {
        let signer = Signer::from_pkcs8_pem(session_id.to_string(), session_private_key_pem)?;
        Ok(Self {
            state: Mutex::new(LifecycleState::Live),
            control_plane: ControlPlaneClient::new(config.control_plane_url.clone()),
            http: reqwest::Client::new(),
            router_url: config.router_url.clone(),
            session_id,
            signer: Some(signer),
            flavor: Flavor::CodeInterpreter { namespace: namespace.to_owned(), name: name.to_owned() },
        })
    }

    /// Attach to an Agent Runtime session by id (§4.8).
    #[must_use]
    pub fn attach_agent_runtime(config: &SdkConfig, session_id: SessionId, namespace: &str, name: &str) -> Self {
        Self {
            state: Mutex::new(LifecycleState::Live),
            control_plane: ControlPlaneClient::new(config.control_plane_url.clone()),
            http: reqwest::Client::new(),
            router_url: config.router_url.clone(),
            session_id,
            signer: None,
            flavor: Flavor::AgentRuntime { namespace: namespace.to_owned(), name: name.to_owned() },
        }
    }

    /// Confirm the freshly created session actually reached `Running` before
    /// handing a `[Live]` client to the caller; clean up and fail otherwise
    /// (§4.8 "the SDK MUST ensure cleanup").
    async fn finish_construction(self) -> Result<Self> {
        match self.control_plane.get_session(self.session_id).await {
            Ok(session) if session.state == SessionState::Running => {
                *self.state.lock().unwrap() = LifecycleState::Live;
                Ok(self)
            }
            Ok(session) => {
                let _ = self.control_plane.delete_session(self.session_id).await;
                *self.state.lock().unwrap() = LifecycleState::Failed;
                Err(SdkError::Internal(format!(
                    "session {} entered state {:?} instead of running",
                    self.session_id, session.state
                )))
            }
            Err(e) => {
                let _ = self.control_plane.delete_session(self.session_id).await;
                *self.state.lock().unwrap() = LifecycleState::Failed;
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn require_live(&self) -> Result<()> {
        if *self.state.lock().unwrap() == LifecycleState::Live {
            Ok(())
        } else {
            Err(SdkError::ClientUnusable)
        }
    }

    fn mark_failed_on_unauthorized(&self, error: &SdkError) {
        if matches!(error, SdkError::Unauthorized(_)) {
            *self.state.lock().unwrap() = LifecycleState::Failed;
        }
    }

    fn require_code_interpreter(&self) -> Result<()> {
        self.require_live()?;
        match &self.flavor {
            Flavor::CodeInterpreter { .. } => Ok(()),
            Flavor::AgentRuntime { .. } => {
                Err(SdkError::Configuration("this operation is only valid for Code Interpreter sessions".into()))
            }
        }
    }

    /// Run a command (§4.3, §4.8). `argv` is executed directly; pass a
    /// single-element slice through a shell with [`Self::run_code`] instead
    /// if you need shell features.
    pub async fn execute(&self, argv: &[String], timeout_secs: Option<f64>) -> Result<ExecuteOutput> {
        self.require_code_interpreter()?;
        let body = ExecuteBody { command: CommandArg::Argv(argv), timeout: timeout_secs };
        self.send_signed_json("POST", "/api/execute", "", &body).await
    }

    /// `runCode(language, code)` (§4.8): wraps `code` into a platform command
    /// and forwards to `execute`.
    pub async fn run_code(&self, language: &str, code: &str, timeout_secs: Option<f64>) -> Result<ExecuteOutput> {
        let command = match language {
            "python" | "py" | "python3" => vec!["python3".to_string(), "-c".to_string(), code.to_string()],
            "bash" | "sh" | "shell" => vec!["bash".to_string(), "-c".to_string(), code.to_string()],
            other => return Err(SdkError::Configuration(format!("unsupported language: {other}"))),
        };
        self.execute(&command, timeout_secs).await
    }

    /// Write a file (§4.3) as JSON `{path, content (base64), mode}`, matching
    /// the Daemon's non-multipart `write_file` path.
    pub async fn write_file(&self, path: &str, content: &[u8], mode: Option<u32>) -> Result<()> {
        self.require_code_interpreter()?;
        #[derive(Serialize)]
        struct Body<'a> {
            path: &'a str,
            content: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            mode: Option<u32>,
        }
        let body = Body { path, content: BASE64.encode(content), mode };
        self.send_signed_json::<_, serde_json::Value>("POST", "/api/files", "", &body).await?;
        Ok(())
    }

    /// List a directory (§4.3).
    pub async fn list_files(&self, path: &str) -> Result<Vec<FileEntry>> {
        self.require_code_interpreter()?;
        let query = format!("path={}", url_escape(path));
        self.send_signed_get("/api/files", &query).await
    }

    /// Read a file's raw bytes (§4.3).
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.require_code_interpreter()?;
        let daemon_path = format!("/api/files/{path}");
        let response = self.send_signed_raw("GET", &daemon_path, "", None, &[]).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Invoke an Agent Runtime (§6 "agent invocation"). The request body is
    /// passed through as JSON; this flavor is unsigned (§4.5).
    pub async fn invoke(&self, payload: &serde_json::Value) -> Result<serde_json::Value> {
        self.require_live()?;
        let Flavor::AgentRuntime { namespace, name } = &self.flavor else {
            return Err(SdkError::Configuration("invoke() is only valid for Agent Runtime sessions".into()));
        };
        let url = format!(
            "{}/v1/namespaces/{namespace}/agent-runtimes/{name}/invocations/",
            self.router_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .header(SESSION_HEADER, self.session_id.to_string())
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = error_from_response(status, &text);
            self.mark_failed_on_unauthorized(&error);
            return Err(error);
        }
        Ok(response.json().await?)
    }

    /// Delete the session and transition to `[Closed]` (§4.8).
    pub async fn close(self) -> Result<()> {
        *self.state.lock().unwrap() = LifecycleState::Closed;
        self.control_plane.delete_session(self.session_id).await
    }

    fn router_prefix(&self) -> String {
        match &self.flavor {
            Flavor::CodeInterpreter { namespace, name } => {
                format!("/v1/code-namespaces/{namespace}/code-interpreters/{name}/invocations")
            }
            Flavor::AgentRuntime { namespace, name } => {
                format!("/v1/namespaces/{namespace}/agent-runtimes/{name}/invocations")
            }
        }
    }

    async fn send_signed_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        daemon_path: &str,
        query: &str,
        body: &B,
    ) -> Result<T> {
        let bytes = serde_json::to_vec(body).map_err(|e| SdkError::Internal(e.to_string()))?;
        let response = self.send_signed_raw(method, daemon_path, query, Some("application/json"), &bytes).await?;
        Ok(response.json().await?)
    }

    async fn send_signed_get<T: serde::de::DeserializeOwned>(&self, daemon_path: &str, query: &str) -> Result<T> {
        let response = self.send_signed_raw("GET", daemon_path, query, None, &[]).await?;
        Ok(response.json().await?)
    }

    async fn send_signed_raw(
        &self,
        method: &str,
        daemon_path: &str,
        query: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<reqwest::Response> {
        self.require_live()?;

        let mut url = format!("{}{}{daemon_path}", self.router_url.trim_end_matches('/'), self.router_prefix());
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }

        let mut request = self
            .http
            .request(method.parse::<reqwest::Method>().map_err(|_| SdkError::Internal("invalid method".into()))?, &url)
            .header(SESSION_HEADER, self.session_id.to_string());
        if let Some(ct) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct);
        }
        if !body.is_empty() {
            request = request.body(body.to_vec());
        }

        if let Some(signer) = &self.signer {
            let canonical = CanonicalRequest { method, path: daemon_path, query, content_type, body };
            let token = signer.sign_request(&canonical, Utc::now(), agentcube_signing::claims::MAX_REQUEST_TOKEN_TTL_SECS)?;
            request = request.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = error_from_response(status, &text);
            self.mark_failed_on_unauthorized(&error);
            return Err(error);
        }
        Ok(response)
    }
}

/// Percent-encode query parameter values without pulling in the `url` crate
/// just for this one path (the Daemon parses with
/// `url::form_urlencoded::parse`, which decodes the same escapes).
fn url_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_escape_passes_unreserved_characters_through() {
        assert_eq!(url_escape("abc-123_.~"), "abc-123_.~");
    }

    #[test]
    fn url_escape_percent_encodes_reserved_characters() {
        assert_eq!(url_escape("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn run_code_rejects_unknown_language() {
        // Build a `Live` client without network access by going through the
        // attach constructor directly.
        let config = SdkConfig {
            control_plane_url: "http://localhost:8080".into(),
            router_url: "http://localhost:9090".into(),
        };
        let client = SessionClient::attach_agent_runtime(&config, SessionId::new_v4(), "default", "agent");
        let result = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(client.run_code_test_helper());
        assert!(result.is_err());
    }

    impl SessionClient {
        async fn run_code_test_helper(&self) -> Result<ExecuteOutput> {
            self.run_code("cobol", "DISPLAY 'HI'.", None).await
        }
    }
}
