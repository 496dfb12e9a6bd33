use agentcube_types::ErrorCategory;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// The control-plane's HTTP-facing error type. Every variant maps onto one
/// `ErrorCategory` (§7) so the status code a client sees is always one of
/// the eight the spec names.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Configuration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limit exceeded")]
    RateLimit { limit: u32, remaining: u32, reset: i64 },

    #[error("upstream provider error: {0}")]
    Provider(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Unauthorized => ErrorCategory::Unauthorized,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::RateLimit { .. } => ErrorCategory::RateLimit,
            Self::Provider(_) => ErrorCategory::Provider,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Internal(_) => ErrorCategory::Resource,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.category().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            Self::RateLimit {
                limit,
                remaining,
                reset,
            } => {
                let mut response =
                    (status, Json(json!({ "error": "rate limit exceeded" }))).into_response();
                let headers = response.headers_mut();
                headers.insert("x-ratelimit-limit", (*limit).into());
                headers.insert("x-ratelimit-remaining", (*remaining).into());
                headers.insert("x-ratelimit-reset", (*reset).into());
                response
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (status, Json(json!({ "error": "internal server error" }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("session not found".into()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                Self::Conflict("session already exists".into())
            }
            _ => {
                tracing::error!(error = %err, "database error");
                Self::Internal(err.into())
            }
        }
    }
}

impl From<agentcube_k8s::K8sAdapterError> for ApiError {
    fn from(err: agentcube_k8s::K8sAdapterError) -> Self {
        use agentcube_k8s::K8sAdapterError as K;
        match err {
            K::AlreadyExists(name) => Self::Conflict(format!("resource already exists: {name}")),
            K::Timeout {
                timeout_secs,
                last_phase,
            } => Self::Timeout(format!("timed out after {timeout_secs}s (phase: {last_phase})")),
            K::InvalidManifest(msg) => Self::Configuration(msg),
            K::Provider { reason, message, .. } => Self::Provider(message.unwrap_or(reason)),
            K::Kube(e) => {
                tracing::error!(error = %e, "kubernetes api error");
                Self::Provider(e.to_string())
            }
        }
    }
}

impl From<agentcube_signing::SigningError> for ApiError {
    fn from(_: agentcube_signing::SigningError) -> Self {
        Self::Unauthorized
    }
}
