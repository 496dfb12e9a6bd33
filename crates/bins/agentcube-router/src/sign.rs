use agentcube_signing::{CanonicalRequest, Signer};
use axum::http::HeaderMap;
use chrono::Utc;

use crate::error::RouterError;

/// Router identity used as the `iss` claim when it signs on behalf of a
/// legacy, unauthenticated client (§4.4 step 5(b), §4.7).
const LEGACY_SIGNER_ISSUER: &str = "agentcube-router";

/// Sign one outbound request on behalf of a client that sent no
/// `Authorization` header of its own (§4.7 "the Router signs on their
/// behalf, using a key it holds and that the Daemon has been bootstrapped
/// with"). Returns the bearer token to attach as `Authorization`.
pub fn sign_for_legacy_client(
    signer: &Signer,
    method: &str,
    path: &str,
    query: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<String, RouterError> {
    let request = CanonicalRequest {
        method,
        path,
        query,
        content_type,
        body,
    };
    signer
        .sign_request(&request, Utc::now(), agentcube_signing::claims::MAX_REQUEST_TOKEN_TTL_SECS)
        .map_err(|e| RouterError::Internal(anyhow::anyhow!("failed to sign legacy request: {e}")))
}

/// `true` if `headers` already carries an `Authorization` bearer token, in
/// which case the Router forwards it unchanged rather than re-signing
/// (§4.7 "Proxy HTTP requests to the Daemon unchanged, preserving the
/// original Authorization header").
#[must_use]
pub fn has_authorization(headers: &HeaderMap) -> bool {
    headers.contains_key(axum::http::header::AUTHORIZATION)
}
