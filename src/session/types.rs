use std::collections::BTreeMap;

use agentcube_types::SessionKind;
use serde::{Deserialize, Serialize};

/// One entry of `PodTemplateSpec.configmap_items` as accepted from an HTTP
/// caller (§3). Exactly one of `value`/`file_path` is expected to be set by
/// the caller; the manager materializes the ConfigMap from whichever is
/// present before the Pod is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigMapItem {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    pub mount_path: String,
    #[serde(default)]
    pub sub_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default = "default_true")]
    pub read_only: bool,
}

fn default_true() -> bool {
    true
}

/// The template a Code Interpreter session is created from (§3
/// `PodTemplateSpec`, surfaced through the HTTP layer by name or inline).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PodTemplateRequest {
    pub image: String,
    #[serde(default)]
    pub cpu_request: Option<String>,
    #[serde(default)]
    pub memory_request: Option<String>,
    #[serde(default)]
    pub cpu_limit: Option<String>,
    #[serde(default)]
    pub memory_limit: Option<String>,
    #[serde(default = "default_container_port")]
    pub container_port: u16,
    #[serde(default)]
    pub image_pull_policy: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub configmap_items: Vec<ConfigMapItem>,
}

fn default_container_port() -> u16 {
    9527
}

/// `createSession` request body (§4.5, §6 `POST /v1/code-interpreter` and
/// `POST /v1/sandboxes` legacy alias).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSessionRequest {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub kind: Option<SessionKind>,
    #[serde(default)]
    pub ttl_secs: Option<i64>,
    /// When present, the caller retains signing authority and the
    /// bootstrap handshake is skipped (§4.4/§9 resolution).
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub template: Option<PodTemplateRequest>,
    /// The out-of-scope CLI's `agent_metadata.yaml` contents, passed through
    /// verbatim by callers that have it open (§6 "the core consumes it only
    /// where it surfaces as an input"). When `template` is absent, the
    /// manager derives a minimal one from this instead.
    #[serde(default)]
    pub workspace_metadata: Option<agentcube_types::WorkspaceMetadata>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl PodTemplateRequest {
    /// Build the minimal template an Agent Runtime session needs from a
    /// workspace metadata file, when the caller didn't separately negotiate
    /// a full `PodTemplateSpec` (§6).
    #[must_use]
    pub fn from_workspace_metadata(meta: &agentcube_types::WorkspaceMetadata) -> Self {
        Self {
            image: meta.image_reference().unwrap_or_default(),
            cpu_request: None,
            memory_request: None,
            cpu_limit: None,
            memory_limit: None,
            container_port: meta.port,
            image_pull_policy: None,
            env: BTreeMap::new(),
            entrypoint: Some(meta.entrypoint.clone()),
            configmap_items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListSessionsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
