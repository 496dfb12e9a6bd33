use agentcube_signing::CanonicalRequest;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};

use crate::error::DaemonError;
use crate::state::AppState;

/// Extract the bearer token from `Authorization`, recompute the canonical
/// digest from the actual request bytes, and verify it against the
/// installed session key (§4.6 verifier steps 1–6). Every failure mode
/// collapses to [`DaemonError::Unauthorized`] — signature, expiry, and
/// digest mismatch are indistinguishable to the caller.
pub fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    method: &str,
    path: &str,
    query: &str,
    body: &[u8],
) -> Result<(), DaemonError> {
    if !state.is_ready() {
        return Err(DaemonError::Unauthorized);
    }
    let token = bearer_token(headers)?;
    let verifier = state.session_verifier.load();
    let verifier = verifier.as_ref().ok_or(DaemonError::Unauthorized)?;

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request = CanonicalRequest {
        method,
        path,
        query,
        content_type,
        body,
    };

    verifier
        .verify_request(&token, &request, Utc::now(), Duration::seconds(state.clock_skew_secs))
        .map_err(|_| DaemonError::Unauthorized)?;
    Ok(())
}

pub fn bearer_token(headers: &HeaderMap) -> Result<String, DaemonError> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(DaemonError::Unauthorized)?;
    value
        .strip_prefix("Bearer ")
        .map(str::to_owned)
        .ok_or(DaemonError::Unauthorized)
}
