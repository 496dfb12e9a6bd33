pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Compose the control-plane's HTTP surface (§6).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/code-interpreter", post(routes::create_code_interpreter))
        .route(
            "/v1/code-interpreter/sessions/{session_id}",
            delete(routes::delete_session).get(routes::get_session),
        )
        .route("/v1/agent-runtime", post(routes::create_agent_runtime))
        .route(
            "/v1/sandboxes",
            post(routes::create_sandbox_legacy).get(routes::list_sessions),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
