/// Errors surfaced by the SDK (§4.8, §7): the categories a caller actually
/// needs to branch on, not a passthrough of every internal error type.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("authentication rejected by server: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, retry after {reset}s")]
    RateLimit { limit: u64, remaining: u64, reset: u64 },

    #[error("server-side provider error: {0}")]
    Provider(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("signing error: {0}")]
    Signing(#[from] agentcube_signing::SigningError),

    #[error("the client is closed or failed and can no longer be used")]
    ClientUnusable,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SdkError>;

/// Map an HTTP status + JSON error body from the Control-Plane or Router
/// onto an [`SdkError`] variant (§7 taxonomy, client side of the mapping
/// described for CLI-style surfaces).
pub(crate) fn error_from_response(status: reqwest::StatusCode, body: &str) -> SdkError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str().map(String::from)))
        .unwrap_or_else(|| body.to_string());

    match status.as_u16() {
        400 => SdkError::Configuration(message),
        401 => SdkError::Unauthorized(message),
        404 => SdkError::NotFound(message),
        409 => SdkError::Conflict(message),
        429 => SdkError::RateLimit { limit: 0, remaining: 0, reset: 0 },
        502 => SdkError::Provider(message),
        504 => SdkError::Timeout(message),
        _ => SdkError::Internal(message),
    }
}
