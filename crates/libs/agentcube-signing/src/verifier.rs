use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::de::DeserializeOwned;

use crate::canonical::CanonicalRequest;
use crate::claims::{BootstrapClaims, RequestClaims};
use crate::error::SigningError;
use crate::signer::ALGORITHM;

/// Recomputes the canonical digest and checks a token's signature and
/// expiry against it — C7. Every failure mode (bad signature, expired
/// token, digest mismatch) is surfaced identically through
/// [`SigningError::category`] so the HTTP layer can return a uniform 401
/// without leaking which check failed (§4.6).
pub struct Verifier {
    decoding_key: DecodingKey,
}

impl Verifier {
    pub fn from_public_key_pem(public_key_pem: &str) -> Result<Self, SigningError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self { decoding_key })
    }

    /// Verify a data-plane request token end to end (§4.6 verifier
    /// behavior, steps 1–6... signature and digest only; Authorization
    /// header parsing is the caller's job):
    /// 1. decode + check signature,
    /// 2. check `iat ≤ now ≤ exp` within `clock_skew`,
    /// 3. recompute the digest from `request` and compare.
    pub fn verify_request(
        &self,
        token: &str,
        request: &CanonicalRequest<'_>,
        now: DateTime<Utc>,
        clock_skew: Duration,
    ) -> Result<RequestClaims, SigningError> {
        let claims = self.decode_unchecked::<RequestClaims>(token)?;
        check_time_window(claims.iat, claims.exp, now, clock_skew)?;

        let expected_digest = request.digest();
        if claims.canonical_request_sha256 != expected_digest {
            return Err(SigningError::DigestMismatch);
        }

        Ok(claims)
    }

    /// Verify a bootstrap token's signature and time window, without a
    /// canonical request to compare against (`/init` has no canonical
    /// request of its own — the claim it carries is the session public key,
    /// not a digest).
    pub fn verify_bootstrap(
        &self,
        token: &str,
        now: DateTime<Utc>,
        clock_skew: Duration,
    ) -> Result<BootstrapClaims, SigningError> {
        let claims = self.decode_unchecked::<BootstrapClaims>(token)?;
        check_time_window(claims.iat, claims.exp, now, clock_skew)?;
        if claims.exp - claims.iat > crate::claims::MAX_BOOTSTRAP_TOKEN_TTL_SECS {
            return Err(SigningError::TtlTooLong);
        }
        Ok(claims)
    }

    /// Decode and check the signature only, skipping the time-window check.
    /// Exposed for tests that want to assert on raw claim values.
    pub fn decode_bootstrap_unchecked(&self, token: &str) -> Result<BootstrapClaims, SigningError> {
        self.decode_unchecked::<BootstrapClaims>(token)
    }

    /// Verify a bearer token's signature and time window with no canonical
    /// request to bind it to (§4.7 CONNECT authentication: a raw byte tunnel
    /// has no method/URI/body of its own to recompute a digest against, so
    /// the Router checks only that the token is genuinely signed by the
    /// session key and currently valid — the same signature+expiry checks
    /// `verify_request` does, minus step 3's digest recomputation).
    pub fn verify_signed_bearer(
        &self,
        token: &str,
        now: DateTime<Utc>,
        clock_skew: Duration,
    ) -> Result<RequestClaims, SigningError> {
        let claims = self.decode_unchecked::<RequestClaims>(token)?;
        check_time_window(claims.iat, claims.exp, now, clock_skew)?;
        Ok(claims)
    }

    fn decode_unchecked<T: DeserializeOwned>(&self, token: &str) -> Result<T, SigningError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.algorithms = vec![Algorithm::RS256];
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = HashSet::new();

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| SigningError::InvalidSignature)
    }
}

/// `iat ≤ now ≤ exp`, both bounds widened by `clock_skew` (§4.6 step 4).
fn check_time_window(
    iat: i64,
    exp: i64,
    now: DateTime<Utc>,
    clock_skew: Duration,
) -> Result<(), SigningError> {
    let now = now.timestamp();
    let skew = clock_skew.num_seconds();
    if iat > now + skew || now > exp + skew {
        return Err(SigningError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Signer;
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

    fn sample_request() -> CanonicalRequest<'static> {
        CanonicalRequest {
            method: "POST",
            path: "/api/execute",
            query: "",
            content_type: Some("application/json"),
            body: b"{\"command\":[\"echo\",\"A\"]}",
        }
    }

    #[test]
    fn tampered_body_fails_digest_check() {
        let (priv_pem, pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&pub_pem).unwrap();

        let now = Utc::now();
        let request = sample_request();
        let token = signer.sign_request(&request, now, 300).unwrap();

        let tampered = CanonicalRequest {
            body: b"{\"command\":[\"echo\",\"B\"]}",
            ..request
        };

        let err = verifier
            .verify_request(&token, &tampered, now, Duration::seconds(30))
            .unwrap_err();
        assert!(matches!(err, SigningError::DigestMismatch));
    }

    #[test]
    fn expired_token_is_rejected() {
        let (priv_pem, pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&pub_pem).unwrap();

        let request = sample_request();
        let past = Utc::now() - Duration::seconds(600);
        let token = signer.sign_request(&request, past, 300).unwrap();

        let err = verifier
            .verify_request(&token, &request, Utc::now(), Duration::seconds(30))
            .unwrap_err();
        assert!(matches!(err, SigningError::Expired));
    }

    #[test]
    fn wrong_key_fails_signature_check() {
        let (priv_pem, _) = test_keypair();
        let (_, other_pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&other_pub_pem).unwrap();

        let request = sample_request();
        let now = Utc::now();
        let token = signer.sign_request(&request, now, 300).unwrap();

        let err = verifier
            .verify_request(&token, &request, now, Duration::seconds(30))
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidSignature));
    }

    #[test]
    fn clock_skew_window_tolerates_small_drift() {
        let (priv_pem, pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&pub_pem).unwrap();

        let request = sample_request();
        let slightly_future = Utc::now() + Duration::seconds(10);
        let token = signer.sign_request(&request, slightly_future, 300).unwrap();

        // Verifier's clock is 10s behind the signer's — within a 30s skew window.
        let result = verifier.verify_request(&token, &request, Utc::now(), Duration::seconds(30));
        assert!(result.is_ok());
    }

    #[test]
    fn verify_signed_bearer_accepts_a_validly_signed_token_with_no_request_to_bind() {
        let (priv_pem, pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&pub_pem).unwrap();

        let now = Utc::now();
        let token = signer.sign_request(&sample_request(), now, 300).unwrap();

        let result = verifier.verify_signed_bearer(&token, now, Duration::seconds(30));
        assert!(result.is_ok());
    }

    #[test]
    fn verify_signed_bearer_rejects_wrong_key() {
        let (priv_pem, _) = test_keypair();
        let (_, other_pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&other_pub_pem).unwrap();

        let now = Utc::now();
        let token = signer.sign_request(&sample_request(), now, 300).unwrap();

        let err = verifier
            .verify_signed_bearer(&token, now, Duration::seconds(30))
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidSignature));
    }

    #[test]
    fn verify_signed_bearer_rejects_expired_token() {
        let (priv_pem, pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("sdk", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&pub_pem).unwrap();

        let past = Utc::now() - Duration::seconds(600);
        let token = signer.sign_request(&sample_request(), past, 300).unwrap();

        let err = verifier
            .verify_signed_bearer(&token, Utc::now(), Duration::seconds(30))
            .unwrap_err();
        assert!(matches!(err, SigningError::Expired));
    }

    #[test]
    fn bootstrap_token_rejects_overlong_ttl_claim() {
        // A forged bootstrap claim with exp far beyond the 60s ceiling must
        // be rejected even though the signature itself is valid.
        let (priv_pem, pub_pem) = test_keypair();
        let signer = Signer::from_pkcs8_pem("control-plane", &priv_pem).unwrap();
        let verifier = Verifier::from_public_key_pem(&pub_pem).unwrap();

        let now = Utc::now();
        let claims = BootstrapClaims {
            iss: "control-plane".into(),
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
            session_public_key: "fake".into(),
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(ALGORITHM),
            &claims,
            &jsonwebtoken::EncodingKey::from_rsa_pem(priv_pem.as_bytes()).unwrap(),
        )
        .unwrap();
        let _ = signer; // signer unused beyond providing the key material above

        let err = verifier
            .verify_bootstrap(&token, now, Duration::seconds(30))
            .unwrap_err();
        assert!(matches!(err, SigningError::TtlTooLong));
    }
}
