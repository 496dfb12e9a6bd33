use agentcube_types::ErrorCategory;

/// Errors surfaced by the K8s Adapter (C1, §4.1, §7).
#[derive(Debug, thiserror::Error)]
pub enum K8sAdapterError {
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("readiness timed out after {timeout_secs}s (last phase: {last_phase})")]
    Timeout {
        timeout_secs: u64,
        last_phase: String,
    },

    #[error("provider error: {reason} (exit_code={exit_code:?})")]
    Provider {
        reason: String,
        exit_code: Option<i32>,
        message: Option<String>,
    },

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl K8sAdapterError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyExists(_) => ErrorCategory::Conflict,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Provider { .. } | Self::Kube(_) => ErrorCategory::Provider,
            Self::InvalidManifest(_) => ErrorCategory::Configuration,
        }
    }

    /// `true` if the underlying Kubernetes API error is a 404 (`NotFound`).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// `true` if the underlying Kubernetes API error is a 409 (`Conflict` /
    /// already exists).
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
            || matches!(self, Self::Kube(kube::Error::Api(e)) if e.code == 409)
    }
}
