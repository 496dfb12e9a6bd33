//! End-to-end coverage for the signed data-plane protocol against a real
//! in-process Daemon (C3) router — scenarios S1 (echo round trip), S3
//! (tampered body rejected), and S4 (bootstrap handshake then first signed
//! call) from spec.md's acceptance scenarios.
//!
//! S5 (idempotent session create) and S6 (Agent Runtime endpoint poll) need
//! a live Postgres + Kubernetes cluster to exercise `session::manager` and
//! `k8s::K8sAdapter` end to end; this pack has no such cluster available, and
//! (per the `pando85-kaniop` example) this corpus's own convention for
//! Kubernetes-heavy paths is real-cluster e2e, not a mocked `kube::Client`.
//! Those two scenarios are therefore left to a live deployment, not faked
//! here (see DESIGN.md).

use std::net::SocketAddr;
use std::time::Duration;

use agentcube::bootstrap::Bootstrapper;
use agentcube_daemon::{AppState, Config};
use agentcube_signing::{CanonicalRequest, Signer};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use tower::ServiceExt;

struct Keypair {
    private_pem: String,
    public_pem: String,
}

fn generate_keypair() -> Keypair {
    let mut rng = rand::rng();
    let private = RsaPrivateKey::new(&mut rng, 2048).expect("rsa keygen");
    let public = private.to_public_key();
    Keypair {
        private_pem: private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
        public_pem: public.to_public_key_pem(LineEnding::LF).unwrap(),
    }
}

/// A Daemon wired up with a session key installed at startup (`auth_mode =
/// static`), skipping `/init` — used by the tests that only care about the
/// signed-request verification path (S1, S3).
fn static_daemon_config(session_root: &std::path::Path, session_public_key_pem: &str) -> Config {
    let bootstrap = generate_keypair();
    Config {
        listen: "127.0.0.1:0".into(),
        bootstrap_public_key_pem: bootstrap.public_pem,
        auth_mode: "static".into(),
        session_public_key_pem: Some(session_public_key_pem.to_string()),
        ttl_secs: 900,
        clock_skew_secs: 30,
        session_root: session_root.to_string_lossy().into_owned(),
    }
}

async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.expect("collect body").to_bytes();
    serde_json::from_slice(&body).expect("response body is JSON")
}

#[tokio::test]
async fn s1_echo_round_trip_succeeds_with_a_valid_signature() {
    let session_root = tempfile::tempdir().expect("tempdir");
    let session = generate_keypair();
    let config = static_daemon_config(session_root.path(), &session.public_pem);
    let state = AppState::new(&config).expect("daemon state");
    let router = agentcube_daemon::router(state);

    let body = serde_json::json!({ "command": ["echo", "hello-agentcube"] });
    let body_bytes = serde_json::to_vec(&body).unwrap();

    let signer = Signer::from_pkcs8_pem("sdk-test", &session.private_pem).unwrap();
    let canonical = CanonicalRequest {
        method: "POST",
        path: "/api/execute",
        query: "",
        content_type: Some("application/json"),
        body: &body_bytes,
    };
    let token = signer.sign_request(&canonical, Utc::now(), 60).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/execute")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body_bytes))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["stdout"].as_str().unwrap().trim(), "hello-agentcube");
}

#[tokio::test]
async fn s3_tampered_body_is_rejected() {
    let session_root = tempfile::tempdir().expect("tempdir");
    let session = generate_keypair();
    let config = static_daemon_config(session_root.path(), &session.public_pem);
    let state = AppState::new(&config).expect("daemon state");
    let router = agentcube_daemon::router(state);

    let signed_body = serde_json::to_vec(&serde_json::json!({ "command": ["echo", "original"] })).unwrap();
    let tampered_body = serde_json::to_vec(&serde_json::json!({ "command": ["echo", "tampered"] })).unwrap();

    let signer = Signer::from_pkcs8_pem("sdk-test", &session.private_pem).unwrap();
    let canonical = CanonicalRequest {
        method: "POST",
        path: "/api/execute",
        query: "",
        content_type: Some("application/json"),
        body: &signed_body,
    };
    let token = signer.sign_request(&canonical, Utc::now(), 60).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/execute")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(tampered_body))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn s3_missing_authorization_header_is_rejected() {
    let session_root = tempfile::tempdir().expect("tempdir");
    let session = generate_keypair();
    let config = static_daemon_config(session_root.path(), &session.public_pem);
    let state = AppState::new(&config).expect("daemon state");
    let router = agentcube_daemon::router(state);

    let body = serde_json::to_vec(&serde_json::json!({ "command": ["echo", "hi"] })).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/execute")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// S2: a command that outruns its requested timeout is killed and reported
/// as exit code 124 with "timed out" in stderr, within well under the
/// process's own sleep duration.
#[tokio::test]
async fn s2_command_exceeding_timeout_reports_exit_code_124() {
    let session_root = tempfile::tempdir().expect("tempdir");
    let session = generate_keypair();
    let config = static_daemon_config(session_root.path(), &session.public_pem);
    let state = AppState::new(&config).expect("daemon state");
    let router = agentcube_daemon::router(state);

    let body = serde_json::json!({ "command": ["sleep", "5"], "timeout": 0.5 });
    let body_bytes = serde_json::to_vec(&body).unwrap();

    let signer = Signer::from_pkcs8_pem("sdk-test", &session.private_pem).unwrap();
    let canonical = CanonicalRequest {
        method: "POST",
        path: "/api/execute",
        query: "",
        content_type: Some("application/json"),
        body: &body_bytes,
    };
    let token = signer.sign_request(&canonical, Utc::now(), 60).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/execute")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body_bytes))
        .unwrap();

    let started = std::time::Instant::now();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["exit_code"], 124);
    assert!(json["stderr"].as_str().unwrap().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

/// S4: a Daemon started in `bootstrap` auth mode rejects every `/api/*` call
/// until the Control-Plane's real `Bootstrapper` completes `/init`, after
/// which a freshly session-signed call succeeds. Run against a real listener
/// (not `oneshot`) since `Bootstrapper::run` is a real `reqwest` client.
#[tokio::test]
async fn s4_bootstrap_handshake_then_first_signed_call_succeeds() {
    let session_root = tempfile::tempdir().expect("tempdir");
    let bootstrap = generate_keypair();
    let session = generate_keypair();

    let config = Config {
        listen: "127.0.0.1:0".into(),
        bootstrap_public_key_pem: bootstrap.public_pem,
        auth_mode: "bootstrap".into(),
        session_public_key_pem: None,
        ttl_secs: 900,
        clock_skew_secs: 30,
        session_root: session_root.path().to_string_lossy().into_owned(),
    };
    let state = AppState::new(&config).expect("daemon state");
    let router = agentcube_daemon::router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let base_url = format!("http://{addr}");
    let bootstrapper = Bootstrapper::new("control-plane-test", &bootstrap.private_pem).unwrap();
    bootstrapper
        .run(&base_url, &session.public_pem)
        .await
        .expect("bootstrap handshake succeeds");
    assert!(state.is_ready());

    // A second /init must fail now that a key is installed (§8 invariant 4).
    let repeat = bootstrapper.run(&base_url, &session.public_pem).await;
    assert!(repeat.is_err());

    let body_value = serde_json::json!({ "command": ["echo", "post-bootstrap"] });
    let body_bytes = serde_json::to_vec(&body_value).unwrap();
    let signer = Signer::from_pkcs8_pem("sdk-test", &session.private_pem).unwrap();
    let canonical = CanonicalRequest {
        method: "POST",
        path: "/api/execute",
        query: "",
        content_type: Some("application/json"),
        body: &body_bytes,
    };
    let token = signer.sign_request(&canonical, Utc::now(), 60).unwrap();

    let http = reqwest::Client::new();
    let response = http
        .post(format!("{base_url}/api/execute"))
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(body_bytes)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["exit_code"], 0);
    assert_eq!(json["stdout"].as_str().unwrap().trim(), "post-bootstrap");

    server.abort();
    let _ = tokio::time::timeout(Duration::from_millis(100), server).await;
}
