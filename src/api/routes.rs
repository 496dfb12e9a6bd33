use agentcube_types::{Session, SessionKind};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::error::ApiError;
use crate::session::types::{CreateSessionRequest, CreateSessionResponse, ListSessionsQuery};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "agentcube-control-plane",
    })
}

/// `POST /v1/code-interpreter` (§6).
pub async fn create_code_interpreter(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let session = state.manager.create_code_interpreter(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id.to_string(),
        }),
    ))
}

/// `DELETE /v1/code-interpreter/sessions/{sessionId}` (§6): 204 on success,
/// 404 if unknown.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let found = state.manager.delete_session(session_id).await?;
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {session_id} not found")))
    }
}

/// `GET /v1/code-interpreter/sessions/{sessionId}` — supplemented per
/// SPEC_FULL.md §4 (`getSession` needs an HTTP binding).
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    let session = state.manager.get_session(session_id).await?;
    Ok(Json(session))
}

/// `GET /v1/sandboxes?limit=&offset=` — supplemented `listSessions` binding.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions = state
        .manager
        .list_sessions(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyCreateSandboxRequest {
    pub kind: SessionKind,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub ttl_secs: Option<i64>,
    #[serde(default)]
    pub template: Option<crate::session::types::PodTemplateRequest>,
}

/// `POST /v1/sandboxes` — legacy compatibility route (§6): dispatches to the
/// Code Interpreter or Agent Runtime creation path by `kind`.
pub async fn create_sandbox_legacy(
    State(state): State<AppState>,
    Json(request): Json<LegacyCreateSandboxRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let create_request = CreateSessionRequest {
        name: request.name,
        namespace: request.namespace,
        kind: Some(request.kind),
        ttl_secs: request.ttl_secs,
        public_key: request.public_key,
        template: request.template,
        workspace_metadata: None,
        metadata: request.metadata,
    };
    let session = match request.kind {
        SessionKind::CodeInterpreter => state.manager.create_code_interpreter(create_request).await?,
        SessionKind::AgentRuntime => state.manager.create_agent_runtime(create_request).await?,
    };
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id.to_string(),
        }),
    ))
}

/// `POST /v1/agent-runtime` — supplemented dedicated creation route for the
/// Agent Runtime flavor, mirroring `create_code_interpreter`'s shape.
pub async fn create_agent_runtime(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let session = state.manager.create_agent_runtime(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id.to_string(),
        }),
    ))
}
