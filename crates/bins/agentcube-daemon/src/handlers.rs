use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use agentcube_signing::Verifier;
use axum::body::{Body, Bytes, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;

use crate::auth;
use crate::error::DaemonError;
use crate::state::AppState;

/// Request body fields the Daemon never logs (§7 "Secrets MUST never be
/// included in error messages"; §9 "the Daemon's logger MUST NOT carry
/// request bodies or tokens") — every handler below logs only method, path,
/// and outcome, never the parsed request or the `Authorization` header.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    ttl_remaining_seconds: i64,
}

/// `GET /health` (§4.3): unauthenticated.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "agentcube-daemon",
        ttl_remaining_seconds: state.ttl_remaining_seconds(),
    })
}

#[derive(Debug, Deserialize)]
struct BootstrapClaimsBody {
    session_public_key: String,
}

/// `POST /init` (§4.4): one-shot bootstrap handshake. The token's signature
/// and time window are checked against the bootstrap key; there is no
/// canonical request to recompute a digest against, since `/init` carries
/// its payload inside the token itself, not the HTTP body.
pub async fn init(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, DaemonError> {
    if state.is_ready() {
        return Err(DaemonError::AlreadyInitialized);
    }

    let token = auth::bearer_token(&headers)?;
    let claims = state
        .bootstrap_verifier
        .verify_bootstrap(&token, chrono::Utc::now(), chrono::Duration::seconds(state.clock_skew_secs))
        .map_err(|_| DaemonError::Unauthorized)?;

    let pem = decode_session_public_key(&claims.session_public_key)?;
    let verifier = Verifier::from_public_key_pem(&pem)
        .map_err(|e| DaemonError::BadRequest(format!("invalid session public key: {e}")))?;

    if !state.install_session_key(verifier) {
        return Err(DaemonError::AlreadyInitialized);
    }
    tracing::info!("session key installed, daemon entering normal mode");
    Ok(StatusCode::OK)
}

/// The bootstrap claim carries base64 PEM (§3 `SignedRequest` invariants,
/// §4.4 step 3: "base64 PEM of fresh public key"). A claim that is already
/// bare PEM (starts with the standard marker) is accepted as-is, since some
/// issuers skip the extra encoding layer.
fn decode_session_public_key(claim: &str) -> Result<String, DaemonError> {
    if claim.starts_with("-----BEGIN") {
        return Ok(claim.to_owned());
    }
    let decoded = BASE64
        .decode(claim)
        .map_err(|_| DaemonError::BadRequest("malformed session_public_key claim".into()))?;
    String::from_utf8(decoded)
        .map_err(|_| DaemonError::BadRequest("session_public_key claim is not valid UTF-8".into()))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandSpec {
    Shell(String),
    Argv(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    command: CommandSpec,
    #[serde(default)]
    timeout: Option<serde_json::Value>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse the `timeout` field: either a bare number of seconds, or a string
/// like `"0.5s"`/`"10"` (§3 `PodTemplateSpec`/§4.3 "timeout: duration").
fn parse_timeout(value: &serde_json::Value) -> Result<Duration, DaemonError> {
    let secs = match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DaemonError::BadRequest("invalid timeout".into()))?,
        serde_json::Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('s');
            trimmed
                .parse::<f64>()
                .map_err(|_| DaemonError::BadRequest(format!("invalid timeout: {s}")))?
        }
        _ => return Err(DaemonError::BadRequest("invalid timeout".into())),
    };
    if secs <= 0.0 {
        return Err(DaemonError::BadRequest("timeout must be positive".into()));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// `POST /api/execute` (§4.3, S1/S2/S3). Array form executes the binary
/// directly; string form is passed through `sh -c` (§3 "executed as a
/// direct process when supplied as an array, else ... platform shell").
pub async fn execute(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<Json<ExecuteResponse>, DaemonError> {
    let (method, uri, headers, body) = split_request(request).await?;
    auth::authenticate(&state, &headers, method.as_str(), uri.path(), uri.query().unwrap_or(""), &body)
        .map_err(|_| DaemonError::Unauthorized)?;
    state.touch();

    let parsed: ExecuteRequest = serde_json::from_slice(&body)
        .map_err(|e| DaemonError::BadRequest(format!("invalid request body: {e}")))?;

    let timeout = parsed
        .timeout
        .as_ref()
        .map(parse_timeout)
        .transpose()?
        .unwrap_or(DEFAULT_EXECUTE_TIMEOUT);

    let mut command = match &parsed.command {
        CommandSpec::Argv(argv) => {
            if argv.is_empty() {
                return Err(DaemonError::BadRequest("command array must not be empty".into()));
            }
            let mut cmd = TokioCommand::new(&argv[0]);
            cmd.args(&argv[1..]);
            cmd
        }
        CommandSpec::Shell(script) => {
            let mut cmd = TokioCommand::new("sh");
            cmd.arg("-c").arg(script);
            cmd
        }
    };
    command
        .current_dir(&state.session_root)
        .envs(&parsed.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let response = run_with_timeout(command, timeout).await?;
    Ok(Json(response))
}

async fn run_with_timeout(
    mut command: TokioCommand,
    timeout: Duration,
) -> Result<ExecuteResponse, DaemonError> {
    let mut child = command
        .spawn()
        .map_err(|e| DaemonError::BadRequest(format!("failed to start command: {e}")))?;
    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr piped");

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok(ExecuteResponse {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code().unwrap_or(-1),
            })
        }
        Ok(Err(e)) => Err(DaemonError::BadRequest(format!("command wait failed: {e}"))),
        Err(_elapsed) => {
            let _ = child.start_kill();
            stdout_task.abort();
            stderr_task.abort();
            Ok(ExecuteResponse {
                stdout: String::new(),
                stderr: format!("command timed out after {:.1}s", timeout.as_secs_f64()),
                exit_code: 124,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileWriteJson {
    path: String,
    content: String,
    #[serde(default)]
    mode: Option<u32>,
}

/// `POST /api/files` (§4.3): JSON `{path, content (base64), mode}` or
/// multipart form `{file, path, mode}`. Per SPEC_FULL.md §4's Open Question
/// resolution, the full serialized body (whichever form it takes)
/// participates in the canonical digest — there is no degraded signing path
/// for multipart.
pub async fn write_file(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<StatusCode, DaemonError> {
    let (method, uri, headers, body) = split_request(request).await?;
    auth::authenticate(&state, &headers, method.as_str(), uri.path(), uri.query().unwrap_or(""), &body)
        .map_err(|_| DaemonError::Unauthorized)?;
    state.touch();

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let (path, bytes, mode) = if content_type.starts_with("multipart/form-data") {
        parse_multipart_file(content_type, &body).await?
    } else {
        let parsed: FileWriteJson = serde_json::from_slice(&body)
            .map_err(|e| DaemonError::BadRequest(format!("invalid request body: {e}")))?;
        let decoded = BASE64
            .decode(&parsed.content)
            .map_err(|_| DaemonError::BadRequest("content must be base64".into()))?;
        (parsed.path, decoded, parsed.mode)
    };

    let resolved = crate::workdir::resolve(&state.session_root, &path)?;
    if let Some(parent) = resolved.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DaemonError::Internal(anyhow::anyhow!(e)))?;
    }
    tokio::fs::write(&resolved, &bytes)
        .await
        .map_err(|e| DaemonError::Internal(anyhow::anyhow!(e)))?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(mode);
        tokio::fs::set_permissions(&resolved, permissions)
            .await
            .map_err(|e| DaemonError::Internal(anyhow::anyhow!(e)))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(StatusCode::CREATED)
}

async fn parse_multipart_file(
    content_type: &str,
    body: &[u8],
) -> Result<(String, Vec<u8>, Option<u32>), DaemonError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| DaemonError::BadRequest("missing multipart boundary".into()))?;
    let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(Bytes::copy_from_slice(body)) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut path = None;
    let mut mode = None;
    let mut file_bytes = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| DaemonError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        match field.name().map(str::to_owned).as_deref() {
            Some("path") => {
                path = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| DaemonError::BadRequest(e.to_string()))?,
                );
            }
            Some("mode") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| DaemonError::BadRequest(e.to_string()))?;
                mode = text.parse::<u32>().ok();
            }
            Some("file") => {
                let mut buf = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| DaemonError::BadRequest(e.to_string()))?
                {
                    buf.extend_from_slice(&chunk);
                }
                file_bytes = Some(buf);
            }
            _ => {}
        }
    }

    let path = path.ok_or_else(|| DaemonError::BadRequest("multipart body missing 'path'".into()))?;
    let bytes = file_bytes.ok_or_else(|| DaemonError::BadRequest("multipart body missing 'file'".into()))?;
    Ok((path, bytes, mode))
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    name: String,
    size: u64,
    is_dir: bool,
}

/// `GET /api/files?path=…` (§4.3): directory listing.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<Json<Vec<FileEntry>>, DaemonError> {
    let (method, uri, headers, body) = split_request(request).await?;
    auth::authenticate(&state, &headers, method.as_str(), uri.path(), uri.query().unwrap_or(""), &body)
        .map_err(|_| DaemonError::Unauthorized)?;
    state.touch();

    let query: BTreeMap<String, String> = form_urlencoded_parse(uri.query().unwrap_or(""));
    let relative = query.get("path").map(String::as_str).unwrap_or(".");
    let resolved = crate::workdir::resolve(&state.session_root, relative)?;

    let mut dir = tokio::fs::read_dir(&resolved)
        .await
        .map_err(|_| DaemonError::NotFound(format!("directory not found: {relative}")))?;

    let mut entries = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| DaemonError::Internal(anyhow::anyhow!(e)))?
    {
        let metadata = entry
            .metadata()
            .await
            .map_err(|e| DaemonError::Internal(anyhow::anyhow!(e)))?;
        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            is_dir: metadata.is_dir(),
        });
    }
    Ok(Json(entries))
}

/// `GET /api/files/{path}` (§4.3): streams file bytes.
pub async fn read_file(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(relative): axum::extract::Path<String>,
    request: Request<Body>,
) -> Result<impl IntoResponse, DaemonError> {
    let (method, uri, headers, body) = split_request(request).await?;
    auth::authenticate(&state, &headers, method.as_str(), uri.path(), uri.query().unwrap_or(""), &body)
        .map_err(|_| DaemonError::Unauthorized)?;
    state.touch();

    let resolved = crate::workdir::resolve(&state.session_root, &relative)?;
    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(|_| DaemonError::NotFound(format!("file not found: {relative}")))?;
    Ok(([(axum::http::header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

/// Split an Axum [`Request`] into its parts plus the fully-buffered body, so
/// every `/api/*` handler can authenticate against the exact bytes received
/// before parsing them (§8 invariant 1: the digest is recomputed from the
/// received bytes, never trusted from the caller).
async fn split_request(request: Request<Body>) -> Result<(Method, Uri, HeaderMap, Bytes), DaemonError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| DaemonError::BadRequest(format!("failed to read request body: {e}")))?;
    Ok((parts.method, parts.uri, parts.headers, bytes))
}

fn form_urlencoded_parse(query: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timeout_accepts_plain_number() {
        let v = serde_json::json!(0.5);
        assert_eq!(parse_timeout(&v).unwrap(), Duration::from_secs_f64(0.5));
    }

    #[test]
    fn parse_timeout_accepts_seconds_suffix() {
        let v = serde_json::json!("0.5s");
        assert_eq!(parse_timeout(&v).unwrap(), Duration::from_secs_f64(0.5));
    }

    #[test]
    fn parse_timeout_rejects_zero_and_negative() {
        assert!(parse_timeout(&serde_json::json!(0)).is_err());
        assert!(parse_timeout(&serde_json::json!(-1)).is_err());
    }

    #[test]
    fn parse_timeout_rejects_garbage() {
        assert!(parse_timeout(&serde_json::json!("soon")).is_err());
    }

    #[test]
    fn command_spec_array_form_parses() {
        let req: ExecuteRequest =
            serde_json::from_str(r#"{"command":["echo","hi"]}"#).unwrap();
        assert!(matches!(req.command, CommandSpec::Argv(v) if v == vec!["echo", "hi"]));
    }

    #[test]
    fn command_spec_string_form_parses() {
        let req: ExecuteRequest = serde_json::from_str(r#"{"command":"echo hi"}"#).unwrap();
        assert!(matches!(req.command, CommandSpec::Shell(s) if s == "echo hi"));
    }

    #[test]
    fn decode_session_public_key_accepts_bare_pem() {
        let pem = "-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----\n";
        assert_eq!(decode_session_public_key(pem).unwrap(), pem);
    }

    #[test]
    fn decode_session_public_key_accepts_base64() {
        let pem = "-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----\n";
        let encoded = BASE64.encode(pem);
        assert_eq!(decode_session_public_key(&encoded).unwrap(), pem);
    }
}
