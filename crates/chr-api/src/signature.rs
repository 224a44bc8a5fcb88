//! Webhook signature verification.
//!
//! The control plane signs the raw request body with HMAC-SHA256 under the
//! shared agent secret and sends `x-chr-signature: sha256=<hex>`. The body
//! is authenticated before it is parsed; a missing, malformed, or wrong
//! signature is a plain `false`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-chr-signature";
const SCHEME_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("agent secret is empty")]
    EmptySecret,

    #[error("agent secret has an unusable length")]
    InvalidKeyLength,
}

/// HMAC-SHA256 signer/verifier keyed with the agent secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    mac: HmacSha256,
}

impl SignatureVerifier {
    pub fn new(secret: &[u8]) -> Result<Self, SignatureError> {
        if secret.is_empty() {
            return Err(SignatureError::EmptySecret);
        }
        let mac =
            HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidKeyLength)?;
        Ok(Self { mac })
    }

    fn digest(&self, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }

    /// Header value the control plane would send for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        format!("{SCHEME_PREFIX}{}", hex::encode(self.digest(body)))
    }

    /// Check `claimed` against the digest of `body` in constant time.
    pub fn verify(&self, body: &[u8], claimed: Option<&str>) -> bool {
        let Some(hex_digest) = claimed.and_then(|c| c.trim().strip_prefix(SCHEME_PREFIX)) else {
            return false;
        };
        let Ok(claimed) = hex::decode(hex_digest) else {
            return false;
        };
        let expected = self.digest(body);
        if claimed.len() != expected.len() {
            return false;
        }
        claimed.ct_eq(expected.as_slice()).into()
    }
}
