use agentcube_types::ErrorCategory;

/// Errors from signing or verifying a data-plane/bootstrap token. Verifier
/// failures deliberately collapse to one category (§4.6 "Any failure
/// produces HTTP 401 ... no diagnostic leakage about which step failed") —
/// the variant still exists internally for logging, but callers building an
/// HTTP response should use [`SigningError::category`], not `match` on the
/// variant.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("failed to encode token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),

    #[error("malformed or unverifiable token")]
    InvalidSignature,

    #[error("token expired or not yet valid")]
    Expired,

    #[error("canonical request digest mismatch")]
    DigestMismatch,

    #[error("token ttl exceeds the maximum allowed")]
    TtlTooLong,
}

impl SigningError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidKey(_) | Self::Encode(_) => ErrorCategory::Configuration,
            Self::InvalidSignature | Self::Expired | Self::DigestMismatch | Self::TtlTooLong => {
                ErrorCategory::Unauthorized
            }
        }
    }
}
