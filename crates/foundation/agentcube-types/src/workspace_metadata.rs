use serde::{Deserialize, Serialize};

/// The schema of the out-of-scope CLI's `agent_metadata.yaml` (§6 "Persisted
/// state"). The core never reads or writes this file itself — the CLI owns
/// that — but a `createSession` caller that has the file open (e.g. an
/// `agentcube invoke` wrapper) may pass its contents straight through as
/// `workspace_metadata` on the create request, which is the one place this
/// shape "surfaces as an input" to the core (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceMetadata {
    pub agent_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub language: Language,
    pub entrypoint: String,
    pub port: u16,
    pub build_mode: BuildMode,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub image: Option<ImageInfo>,
    #[serde(default)]
    pub requirements_file: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_endpoint: Option<String>,
    #[serde(default)]
    pub k8s_deployment: serde_json::Value,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageInfo {
    pub repository_url: String,
    pub tag: String,
    pub build_mode: BuildMode,
    #[serde(default)]
    pub build_size: Option<u64>,
    #[serde(default)]
    pub build_time: Option<String>,
}

/// §6: "language ∈ {python, java}".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
}

/// §6: "build_mode ∈ {local, cloud}".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Local,
    Cloud,
}

impl WorkspaceMetadata {
    /// `port ∈ [1, 65535]` (§6); `language`/`build_mode` are validated by
    /// serde itself since both are closed Rust enums — an unrecognized value
    /// fails to deserialize before this method ever runs.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be between 1 and 65535".into());
        }
        if self.agent_name.trim().is_empty() {
            return Err("agent_name must not be empty".into());
        }
        Ok(())
    }

    /// The full image reference this metadata resolves to, for callers that
    /// only have the workspace metadata and no separately-negotiated
    /// `PodTemplateSpec`.
    #[must_use]
    pub fn image_reference(&self) -> Option<String> {
        self.image.as_ref().map(|i| format!("{}:{}", i.repository_url, i.tag))
    }
}
