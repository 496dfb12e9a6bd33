use agentcube_types::ErrorCategory;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Router-facing errors (§4.7 "Failure modes"). Every variant maps onto one
/// of the §7 categories like every other crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("backend refused the request")]
    BackendRefused,

    #[error("session not yet ready")]
    PendingTimeout,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RouterError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownSession(_) => ErrorCategory::NotFound,
            Self::BackendRefused => ErrorCategory::Provider,
            Self::PendingTimeout => ErrorCategory::Timeout,
            Self::BadRequest(_) => ErrorCategory::Configuration,
            Self::Unauthorized => ErrorCategory::Unauthorized,
            Self::Internal(_) => ErrorCategory::Resource,
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.category().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // §4.7: unknown session -> 404, backend refuses -> 502, CONNECT to a
        // Pending session -> 503 after a bounded wait.
        let status = match &self {
            Self::PendingTimeout => StatusCode::SERVICE_UNAVAILABLE,
            _ => status,
        };
        match &self {
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal router error");
                (status, Json(json!({ "error": "internal server error" }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
