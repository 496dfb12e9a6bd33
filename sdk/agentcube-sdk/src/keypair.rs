use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::error::{Result, SdkError};

/// The SDK-owned session RSA keypair (§4.4 step 3, §4.8 "owns key generation
/// per session"). The public half travels to the Control-Plane as
/// `publicKey` at session-creation time; the private half never leaves the
/// process.
pub struct SessionKeypair {
    pub private_key_pem: String,
    pub public_key_pem: String,
}

/// Bits chosen to match the keys the rest of the workspace generates for the
/// same purpose (§4.4's Control-Plane-issued path, `agentcube`'s
/// `bootstrap` module).
const KEY_BITS: usize = 2048;

impl SessionKeypair {
    pub fn generate() -> Result<Self> {
        let mut rng = rand::rng();
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| SdkError::Internal(format!("failed to generate session keypair: {e}")))?;
        let public_key = private_key.to_public_key();

        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| SdkError::Internal(format!("failed to encode session private key: {e}")))?
            .to_string();
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SdkError::Internal(format!("failed to encode session public key: {e}")))?;

        Ok(Self { private_key_pem, public_key_pem })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_usable_pem_keypair() {
        let keypair = SessionKeypair::generate().unwrap();
        assert!(keypair.private_key_pem.contains("PRIVATE KEY"));
        assert!(keypair.public_key_pem.contains("PUBLIC KEY"));
    }

    #[test]
    fn each_generation_is_distinct() {
        let a = SessionKeypair::generate().unwrap();
        let b = SessionKeypair::generate().unwrap();
        assert_ne!(a.private_key_pem, b.private_key_pem);
    }
}
