use serde::{Deserialize, Serialize};

/// Claims carried by a data-plane bearer token (§3 `SignedRequest`, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestClaims {
    /// Issuer identifier: the SDK's client id, or the Router when it signs
    /// on behalf of an unauthenticated legacy client (§4.6, §4.7).
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub canonical_request_sha256: String,
}

/// Claims carried by a one-shot `/init` bootstrap token (§4.4). `exp` MUST
/// be at most `iat + 60s` for bootstrap tokens (replay defense).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapClaims {
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Base64 PEM of the fresh session RSA public key being installed.
    pub session_public_key: String,
}

/// Maximum lifetime of a data-plane request token (§4.6: `exp ≤ iat + 300s`).
pub const MAX_REQUEST_TOKEN_TTL_SECS: i64 = 300;

/// Maximum lifetime of a bootstrap token (§4.4: `exp ≤ iat + 60s`).
pub const MAX_BOOTSTRAP_TOKEN_TTL_SECS: i64 = 60;
