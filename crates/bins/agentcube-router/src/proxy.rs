use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::control_plane::SessionInfo;
use crate::error::RouterError;
use crate::sign;

/// Headers that are specific to this one hop and must never be copied
/// through to the Daemon (standard reverse-proxy hygiene).
const HOP_BY_HOP: &[&str] = &["host", "content-length", "connection", "transfer-encoding"];

/// Resolve `session_id` to a Daemon base URL, consulting the cache first
/// and falling back to the Control-Plane on a miss (§4.7). If the session
/// is still `Pending`, poll briefly (bounded by `state.connect_wait`) before
/// giving up with [`RouterError::PendingTimeout`].
pub async fn resolve_endpoint(state: &Arc<AppState>, session_id: &str) -> Result<String, RouterError> {
    if let Some(endpoint) = state.cache.get(session_id) {
        return Ok(endpoint);
    }
    let session = resolve_session(state, session_id).await?;
    session
        .endpoint
        .ok_or_else(|| RouterError::Internal(anyhow::anyhow!("resolved session has no endpoint")))
}

/// Resolve `session_id` to its full Control-Plane session record,
/// including `session_public_key` — needed by [`crate::connect`] to
/// authenticate a `CONNECT` tunnel, which `resolve_endpoint`'s plain string
/// return can't carry. Polls a `Pending` session the same way
/// `resolve_endpoint` does, and populates the endpoint cache on success.
pub async fn resolve_session(state: &Arc<AppState>, session_id: &str) -> Result<SessionInfo, RouterError> {
    let deadline = tokio::time::Instant::now() + state.connect_wait;
    loop {
        let session = state.control_plane.get_session(session_id).await?;
        if let Some(endpoint) = &session.endpoint {
            state.cache.insert(session_id.to_owned(), endpoint.clone());
            return Ok(session);
        }
        if session.state != "pending" {
            return Err(RouterError::UnknownSession(session_id.to_owned()));
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(RouterError::PendingTimeout);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// Forward one HTTP request to the Daemon behind `session_id` (§4.7): the
/// `Authorization` header is preserved as-is when present; otherwise, if the
/// Router holds a legacy signing key, it mints one on the client's behalf.
#[allow(clippy::too_many_arguments)]
pub async fn forward(
    state: &Arc<AppState>,
    session_id: &str,
    method: Method,
    daemon_path: &str,
    query: &str,
    mut headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RouterError> {
    let endpoint = resolve_endpoint(state, session_id).await?;

    if !sign::has_authorization(&headers) {
        if let Some(signer) = &state.legacy_signer {
            let content_type = headers
                .get(axum::http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let token = sign::sign_for_legacy_client(
                signer,
                method.as_str(),
                daemon_path,
                query,
                content_type.as_deref(),
                &body,
            )?;
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RouterError::Internal(anyhow::anyhow!(e)))?;
            headers.insert(axum::http::header::AUTHORIZATION, value);
        }
    }

    let mut url = format!("{}{daemon_path}", endpoint.trim_end_matches('/'));
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }

    let mut request_builder = state.http.request(method, &url);
    for (name, value) in &headers {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        request_builder = request_builder.header(name.clone(), value.clone());
    }
    request_builder = request_builder.body(body.to_vec());

    let response = request_builder
        .send()
        .await
        .map_err(|_| RouterError::BackendRefused)?;

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response_headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes()) {
            if HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            response_headers.insert(name, value.clone());
        }
    }
    let body = response.bytes().await.map_err(|_| RouterError::BackendRefused)?;

    Ok((status, response_headers, body).into_response())
}
