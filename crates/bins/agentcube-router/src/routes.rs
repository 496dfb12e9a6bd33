use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use axum::routing::{MethodFilter, get, on, post};
use serde::Serialize;

use crate::AppState;
use crate::connect::connect_tunnel;
use crate::error::RouterError;
use crate::proxy;

/// The `x-agentcube-session-id` header every data-plane request carries
/// (§6). Its absence on the Agent Runtime invoke path triggers implicit
/// session creation; its absence anywhere else is a client error.
const SESSION_HEADER: &str = "x-agentcube-session-id";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    cached_sessions: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "agentcube-router",
        cached_sessions: state.cache.len(),
    })
}

/// Compose the Router's HTTP surface (§6, §4.7).
#[must_use]
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .route(
            "/v1/code-namespaces/{ns}/code-interpreters/{name}/invocations/api/execute",
            post(code_interpreter_execute),
        )
        .route(
            "/v1/code-namespaces/{ns}/code-interpreters/{name}/invocations/api/files",
            post(code_interpreter_files).get(code_interpreter_files),
        )
        .route(
            "/v1/code-namespaces/{ns}/code-interpreters/{name}/invocations/api/files/{*path}",
            get(code_interpreter_file_download),
        )
        .route(
            "/v1/namespaces/{ns}/agent-runtimes/{name}/invocations/",
            post(agent_runtime_invoke),
        )
        .route(
            "/v1/sandboxes/{session_id}",
            on(MethodFilter::CONNECT, connect_tunnel),
        )
        .with_state(state)
}

fn required_session_id(headers: &HeaderMap) -> Result<String, RouterError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| RouterError::BadRequest(format!("missing {SESSION_HEADER} header")))
}

async fn code_interpreter_execute(
    State(state): State<Arc<AppState>>,
    Path((_ns, _name)): Path<(String, String)>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, RouterError> {
    let session_id = required_session_id(&headers)?;
    proxy::forward(
        &state,
        &session_id,
        Method::POST,
        "/api/execute",
        query.as_deref().unwrap_or(""),
        headers,
        body,
    )
    .await
}

async fn code_interpreter_files(
    State(state): State<Arc<AppState>>,
    Path((_ns, _name)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, RouterError> {
    let session_id = required_session_id(&headers)?;
    proxy::forward(
        &state,
        &session_id,
        method,
        "/api/files",
        query.as_deref().unwrap_or(""),
        headers,
        body,
    )
    .await
}

async fn code_interpreter_file_download(
    State(state): State<Arc<AppState>>,
    Path((_ns, _name, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, RouterError> {
    let session_id = required_session_id(&headers)?;
    let daemon_path = format!("/api/files/{path}");
    proxy::forward(
        &state,
        &session_id,
        Method::GET,
        &daemon_path,
        query.as_deref().unwrap_or(""),
        headers,
        body,
    )
    .await
}

/// `POST /v1/namespaces/{ns}/agent-runtimes/{name}/invocations/` (§6): a
/// first call without `x-agentcube-session-id` mints a session and echoes
/// the new id back in the response header; subsequent calls route by the
/// header they were given.
async fn agent_runtime_invoke(
    State(state): State<Arc<AppState>>,
    Path((ns, name)): Path<(String, String)>,
    mut headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, RouterError> {
    let (session_id, freshly_created) = match headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    {
        Some(id) => (id, false),
        None => {
            let session = state.control_plane.create_agent_runtime_session(&ns, &name).await?;
            (session.id, true)
        }
    };

    headers.remove(SESSION_HEADER);
    let mut response = proxy::forward(
        &state,
        &session_id,
        Method::POST,
        "/",
        query.as_deref().unwrap_or(""),
        headers,
        body,
    )
    .await?;

    if freshly_created {
        if let Ok(value) = axum::http::HeaderValue::from_str(&session_id) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    Ok(response)
}
