use std::sync::Arc;

use agentcube_signing::Verifier;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{Duration as ChronoDuration, Utc};
use tokio::io::copy_bidirectional;
use tokio::net::TcpStream;

use crate::AppState;
use crate::control_plane::SessionInfo;
use crate::error::RouterError;

/// `CONNECT /v1/sandboxes/{sessionId}` (§4.7, §6): upgrade the client
/// connection to a raw byte tunnel spliced to the resolved Daemon pod, for
/// SSH-based sandbox flavors. The Router only proxies bytes once the tunnel
/// is authenticated and the endpoint resolved — everything inside the
/// tunnel (SSH handshake, etc.) is the external collaborator's concern.
pub async fn connect_tunnel(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    request: Request,
) -> Result<Response, RouterError> {
    let session = crate::proxy::resolve_session(&state, &session_id).await?;
    authenticate_connect(&request, &session, state.clock_skew_secs)?;
    let endpoint = session
        .endpoint
        .clone()
        .ok_or_else(|| RouterError::Internal(anyhow::anyhow!("resolved session has no endpoint")))?;
    let authority = endpoint
        .parse::<axum::http::Uri>()
        .ok()
        .and_then(|uri| uri.authority().map(ToString::to_string))
        .ok_or_else(|| RouterError::Internal(anyhow::anyhow!("malformed daemon endpoint: {endpoint}")))?;

    tokio::spawn(async move {
        match hyper::upgrade::on(request).await {
            Ok(upgraded) => {
                if let Err(e) = splice(upgraded, &authority).await {
                    tracing::warn!(error = %e, session_id = %session_id, "connect tunnel closed with error");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, session_id = %session_id, "failed to upgrade connect tunnel");
            }
        }
    });

    Ok(StatusCode::OK.into_response())
}

async fn splice(upgraded: hyper::upgrade::Upgraded, backend_authority: &str) -> anyhow::Result<()> {
    let mut backend = TcpStream::connect(backend_authority).await?;
    let mut client_io = hyper_util::rt::TokioIo::new(upgraded);
    copy_bidirectional(&mut client_io, &mut backend).await?;
    Ok(())
}

/// CONNECT authentication (§4.7 "The Router MUST authenticate the
/// CONNECT"): a raw byte tunnel has no request body or query string to bind
/// a canonical digest to, so the Router verifies the bearer token's
/// signature and time window against the session's own public key
/// (`Verifier::verify_signed_bearer`) instead of the full digest-bound
/// `verify_request` the Daemon uses on the traffic that flows through the
/// tunnel once it's open. Any failure — missing header, malformed token,
/// wrong key, expired claim, or a session with no key on file — is rejected
/// identically (§4.6 step 6: no diagnostic leakage about which check
/// failed).
fn authenticate_connect(request: &Request, session: &SessionInfo, clock_skew_secs: i64) -> Result<(), RouterError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(RouterError::Unauthorized)?;

    let public_key_pem = session.session_public_key.as_deref().ok_or(RouterError::Unauthorized)?;
    let verifier = Verifier::from_public_key_pem(public_key_pem).map_err(|_| RouterError::Unauthorized)?;
    verifier
        .verify_signed_bearer(token, Utc::now(), ChronoDuration::seconds(clock_skew_secs))
        .map_err(|_| RouterError::Unauthorized)?;
    Ok(())
}
