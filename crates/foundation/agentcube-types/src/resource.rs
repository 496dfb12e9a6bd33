use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// The kind of cluster object a session owns (§3 `SandboxResource`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SandboxKind {
    Pod,
    Service,
    ConfigMap,
    AgentRuntimeCr,
}

impl SandboxKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Service => "Service",
            Self::ConfigMap => "ConfigMap",
            Self::AgentRuntimeCr => "AgentRuntimeCR",
        }
    }
}

/// A single cluster resource tracked on behalf of a session (§3). Invariant:
/// deleting a session deletes every tracked `SandboxResource` exactly once
/// (enforced by the Resource Tracker, not by this type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxResource {
    pub kind: SandboxKind,
    pub name: String,
    pub namespace: String,
}

impl SandboxResource {
    #[must_use]
    pub fn new(kind: SandboxKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// A resource entry keyed by the session that owns it — the shape the
/// Resource Tracker (§4.2) hands back from `getResources`.
#[derive(Debug, Clone)]
pub struct TrackedResources {
    pub session_id: SessionId,
    pub resources: Vec<SandboxResource>,
}
