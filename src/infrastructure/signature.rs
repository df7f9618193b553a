//! HMAC-SHA256 signatures shared with the payment provider.
//!
//! Webhooks are signed as `HMACSHA256=<base64(HMAC(secret, base64(SHA-256(body))))>`.
//! Outgoing checkout requests sign a newline-separated component string that
//! ends with the same body digest.

use crate::domain::ports::SignatureVerifier;
use crate::error::{GateError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "HMACSHA256=";

/// `base64(SHA-256(body))`.
pub fn body_digest(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

fn mac(secret: &[u8]) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret)
        .map_err(|e| GateError::Validation(format!("invalid signing key: {e}")))
}

/// Headers that take part in a checkout request signature.
#[derive(Debug, Clone)]
pub struct RequestComponents<'a> {
    pub client_id: &'a str,
    pub request_id: &'a str,
    pub timestamp: &'a str,
    pub target: &'a str,
}

/// Signature header value for an outgoing checkout request.
pub fn request_signature(secret: &[u8], components: &RequestComponents<'_>, body: &[u8]) -> Result<String> {
    let component = format!(
        "Client-Id:{}\nRequest-Id:{}\nRequest-Timestamp:{}\nRequest-Target:{}\nDigest:{}",
        components.client_id,
        components.request_id,
        components.timestamp,
        components.target,
        body_digest(body)
    );
    let mut mac = mac(secret)?;
    mac.update(component.as_bytes());
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        STANDARD.encode(mac.finalize().into_bytes())
    ))
}

/// Verifies webhook signatures with the shared secret.
#[derive(Clone)]
pub struct HmacSignatureVerifier {
    secret: Vec<u8>,
}

impl HmacSignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Produces the header value the provider would send for `body`.
    pub fn sign(&self, body: &[u8]) -> Result<String> {
        let mut mac = mac(&self.secret)?;
        mac.update(body_digest(body).as_bytes());
        Ok(format!(
            "{SIGNATURE_PREFIX}{}",
            STANDARD.encode(mac.finalize().into_bytes())
        ))
    }
}

impl SignatureVerifier for HmacSignatureVerifier {
    fn verify(&self, body: &[u8], signature: &str) -> Result<()> {
        let encoded = signature
            .trim()
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(GateError::SignatureInvalid)?;
        let expected = STANDARD
            .decode(encoded)
            .map_err(|_| GateError::SignatureInvalid)?;

        let mut mac = mac(&self.secret)?;
        mac.update(body_digest(body).as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&expected)
            .map_err(|_| GateError::SignatureInvalid)
    }
}
