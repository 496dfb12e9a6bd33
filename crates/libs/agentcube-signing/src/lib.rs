//! The signed data-plane protocol (§4.6): a canonical request digest bound
//! into a short-lived RSA-signed JWT bearer, produced by the Signer (C6) and
//! checked by the Verifier (C7). Both sides of `agentcube-signing` MUST agree
//! bit-for-bit on [`canonical::canonical_request_digest`] — that function is
//! the one place this agreement is expressed, and every caller (SDK, Router,
//! Daemon) goes through it rather than reimplementing the digest.

pub mod canonical;
pub mod claims;
pub mod error;
pub mod signer;
pub mod verifier;

pub use canonical::{CanonicalRequest, canonical_request_digest};
pub use claims::{BootstrapClaims, RequestClaims};
pub use error::SigningError;
pub use signer::Signer;
pub use verifier::Verifier;
