use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;

use crate::canonical::CanonicalRequest;
use crate::claims::{BootstrapClaims, MAX_BOOTSTRAP_TOKEN_TTL_SECS, RequestClaims};
use crate::error::SigningError;

/// RSA algorithm fixed across the deployment (§4.6: "one choice, fixed").
/// PKCS#1 v1.5 over SHA-256, i.e. `RS256`.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

/// Mints signed bearer tokens on behalf of one issuer (the SDK signing its
/// own requests, or the Router signing on behalf of a legacy client, or the
/// provisioner minting a bootstrap token) — C6.
pub struct Signer {
    issuer: String,
    encoding_key: EncodingKey,
}

impl Signer {
    /// Build a signer from a PEM-encoded RSA private key (PKCS#1 or PKCS#8).
    pub fn from_pkcs8_pem(issuer: impl Into<String>, private_key_pem: &str) -> Result<Self, SigningError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self {
            issuer: issuer.into(),
            encoding_key,
        })
    }

    /// Sign one outbound data-plane request (§4.6). `ttl_secs` is clamped to
    /// the 300s ceiling regardless of what the caller asks for.
    pub fn sign_request(
        &self,
        request: &CanonicalRequest<'_>,
        now: DateTime<Utc>,
        ttl_secs: i64,
    ) -> Result<String, SigningError> {
        let ttl_secs = ttl_secs.min(crate::claims::MAX_REQUEST_TOKEN_TTL_SECS).max(1);
        let claims = RequestClaims {
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ttl_secs,
            canonical_request_sha256: request.digest(),
        };
        self.encode(&claims)
    }

    /// Mint a one-shot bootstrap token carrying the fresh session public key
    /// (§4.4 step 3). `exp` is clamped to the 60s bootstrap ceiling.
    pub fn sign_bootstrap(
        &self,
        session_public_key_pem_b64: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<String, SigningError> {
        let claims = BootstrapClaims {
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + MAX_BOOTSTRAP_TOKEN_TTL_SECS,
            session_public_key: session_public_key_pem_b64.into(),
        };
        self.encode(&claims)
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, SigningError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key).map_err(SigningError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::Verifier;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    fn test_keypair() -> (String, String) {
        let mut rng = rand::rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = private.to_public_key();
        let priv_pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let pub_pem = public.to_public_key_pem(LineEnding::LF).unwrap();
        (priv_pem, pub_pem)
    }

    #[test]
    fn signs_and_verifies_a_request() {
        let (priv_pem, pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk-client-1", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&pub_pem).unwrap();

        let request = CanonicalRequest {
            method: "POST",
            path: "/api/execute",
            query: "",
            content_type: Some("application/json"),
            body: b"{\"command\":[\"echo\",\"hi\"]}",
        };

        let now = Utc::now();
        let token = signer.sign_request(&request, now, 300).unwrap();
        let claims = verifier
            .verify_request(&token, &request, now, chrono::Duration::seconds(30))
            .unwrap();
        assert_eq!(claims.iss, "sdk-client-1");
    }

    #[test]
    fn request_ttl_is_clamped_to_300s() {
        let (priv_pem, _) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk", &priv_pem).unwrap();
        let request = CanonicalRequest {
            method: "GET",
            path: "/health",
            query: "",
            content_type: None,
            body: b"",
        };
        let now = Utc::now();
        let token = signer.sign_request(&request, now, 10_000).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, ALGORITHM);
    }

    #[test]
    fn bootstrap_ttl_is_60s() {
        let (priv_pem, pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("control-plane", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&pub_pem).unwrap();
        let now = Utc::now();
        let token = signer.sign_bootstrap("base64-pem-goes-here", now).unwrap();
        let claims = verifier.decode_bootstrap_unchecked(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_BOOTSTRAP_TOKEN_TTL_SECS);
    }
}
