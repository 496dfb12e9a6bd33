use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// The `AgentRuntime` custom resource (§3, §6): a higher-level sandbox kind
/// reconciled by an out-of-process operator, not directly by the K8s
/// Adapter. The adapter only upserts/reads this object and polls
/// `status.agentEndpoint`/`status.status`; it never runs reconciliation
/// logic itself.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[kube(
    group = "runtime.agentcube.io",
    version = "v1alpha1",
    kind = "AgentRuntime",
    plural = "agentruntimes",
    namespaced,
    status = "AgentRuntimeStatus"
)]
#[kube(derive = "Default")]
#[kube(derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimeSpec {
    /// `spec.ports[] = {name, port, protocol, pathPrefix}` (§6).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<AgentRuntimePort>,
    /// `spec.template.spec.containers[]`, an OCI-style container spec (§6) —
    /// carried as a real `k8s_openapi` `PodTemplateSpec` rather than a
    /// hand-rolled subset, since the operator that reconciles this CR
    /// expects the same shape a Deployment's `template` would have.
    pub template: PodTemplateSpec,
    /// Duration string, e.g. `"15m"` (§6).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_timeout: String,
    /// Duration string, e.g. `"4h"` (§6).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub max_session_duration: String,
    /// The session's verification key, threaded through for Agent Runtime
    /// flavors that opt into signed invocation even though bootstrap itself
    /// is skipped (§4.5 "Agent Runtime does not require bootstrap").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_public_key: Option<String>,
}

/// `spec.ports[]` entry (§6).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimePort {
    pub name: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
}

fn default_protocol() -> String {
    "TCP".to_owned()
}

/// Reconciler-owned status (§6 `status.agentEndpoint`, `status.status`; the
/// K8s Adapter never writes this struct, only reads it while polling).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimeStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AgentRuntimeStatus {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == "Ready" && self.agent_endpoint.is_some()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == "Failed"
    }
}
