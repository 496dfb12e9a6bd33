pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod workdir;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Compose the in-pod Daemon's HTTP surface (§4.3).
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/init", post(handlers::init))
        .route("/api/execute", post(handlers::execute))
        .route(
            "/api/files",
            get(handlers::list_files).post(handlers::write_file),
        )
        .route("/api/files/{*path}", get(handlers::read_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Background sweeper that self-terminates the process once the session has
/// been idle past its TTL (§4.3 "A background task terminates the process
/// if `now - lastActivityAt > ttl`").
pub async fn run_ttl_sweeper(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        interval.tick().await;
        if state.is_expired() {
            tracing::warn!("session ttl elapsed with no activity, terminating");
            std::process::exit(0);
        }
    }
}
