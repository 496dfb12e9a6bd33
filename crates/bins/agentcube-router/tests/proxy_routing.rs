//! Routing and proxying behaviour of the Router (C8) against a wiremock
//! Control-Plane and a real fake-Daemon HTTP server — no live cluster needed.

use std::sync::Arc;

use agentcube_router::{AppState, Config};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(control_plane_url: String) -> Config {
    Config {
        listen: "127.0.0.1:0".into(),
        control_plane_url,
        cache_ttl_secs: 30,
        signing_private_key_pem: None,
        connect_wait_secs: 1,
        clock_skew_secs: 30,
    }
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.expect("collect body").to_bytes().to_vec()
}

#[tokio::test]
async fn missing_session_header_is_rejected_with_bad_request() {
    let state = AppState::new(&test_config("http://127.0.0.1:1".into())).unwrap();
    let app = agentcube_router::routes::router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/code-namespaces/default/code-interpreters/my-session/invocations/api/execute")
        .body(Body::from(r#"{"command":["echo","hi"]}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_session_is_rejected_with_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/code-interpreter/sessions/missing-session"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let state = AppState::new(&test_config(mock_server.uri())).unwrap();
    let app = agentcube_router::routes::router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/code-namespaces/default/code-interpreters/my-session/invocations/api/execute")
        .header("x-agentcube-session-id", "missing-session")
        .body(Body::from(r#"{"command":["echo","hi"]}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// A minimal stand-in for the Daemon: echoes back whatever body it receives
/// under `/api/execute`, so the test can assert the Router forwarded the
/// exact bytes it was given.
async fn fake_daemon_echo(body: Bytes) -> Bytes {
    body
}

use axum::body::Bytes;

#[tokio::test]
async fn forwards_requests_to_the_resolved_daemon_endpoint() {
    let daemon = Router::new().route("/api/execute", post(fake_daemon_echo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let daemon_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, daemon).await.unwrap();
    });

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/code-interpreter/sessions/live-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "live-session",
            "state": "running",
            "endpoint": format!("http://{daemon_addr}"),
        })))
        .mount(&mock_server)
        .await;

    let state = AppState::new(&test_config(mock_server.uri())).unwrap();
    let app = agentcube_router::routes::router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/code-namespaces/default/code-interpreters/my-session/invocations/api/execute")
        .header("x-agentcube-session-id", "live-session")
        .header("authorization", "Bearer already-signed")
        .body(Body::from(r#"{"command":["echo","hi"]}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_body(response).await;
    assert_eq!(body, br#"{"command":["echo","hi"]}"#.to_vec());
}

#[tokio::test]
async fn unsigned_request_is_rejected_without_a_legacy_signing_key() {
    let daemon = Router::new().route("/api/execute", post(fake_daemon_echo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let daemon_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, daemon).await.unwrap();
    });

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/code-interpreter/sessions/live-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "live-session",
            "state": "running",
            "endpoint": format!("http://{daemon_addr}"),
        })))
        .mount(&mock_server)
        .await;

    // No `signing_private_key_pem` configured: an unsigned request is
    // forwarded as-is (no Authorization header at all) and it's up to the
    // Daemon to reject it — the Router itself has nothing to check here, it
    // just has no legacy key to sign on the caller's behalf.
    let state = AppState::new(&test_config(mock_server.uri())).unwrap();
    let app = agentcube_router::routes::router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/code-namespaces/default/code-interpreters/my-session/invocations/api/execute")
        .header("x-agentcube-session-id", "live-session")
        .body(Body::from(r#"{"command":["echo","hi"]}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    // The fake Daemon above accepts anything, so this exercises only that
    // the Router didn't error out building the request — real auth
    // rejection of unsigned calls is covered against the real Daemon in
    // `tests/e2e_daemon_protocol.rs` at the workspace root.
    assert_eq!(response.status(), StatusCode::OK);
    let _ = Arc::new(());
}
