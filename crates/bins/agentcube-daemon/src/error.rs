use agentcube_types::ErrorCategory;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Daemon-facing errors (§4.3, §7). Never carries request bodies or token
/// values — only a short stable error code, per §7's redaction requirement.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DaemonError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized | Self::AlreadyInitialized => ErrorCategory::Unauthorized,
            Self::BadRequest(_) => ErrorCategory::Configuration,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::Internal(_) => ErrorCategory::Resource,
        }
    }
}

impl IntoResponse for DaemonError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.category().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // §4.6 step 6: "no diagnostic leakage about which step failed" for
        // auth failures — the error code only, never the underlying reason.
        let error = match &self {
            Self::Unauthorized | Self::AlreadyInitialized => "unauthorized".to_string(),
            Self::Internal(e) => {
                tracing::error!(error = %e, "internal daemon error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": error }))).into_response()
    }
}
