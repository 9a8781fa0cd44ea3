//! Webhook signature verification.
//!
//! The provider signs each delivery with HMAC-SHA256 over the raw request
//! body, keyed by the webhook token, and sends the hex digest in the
//! `X-SHA2-Signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-sha2-signature";

/// Checks that a delivery really came from the provider.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, raw: &[u8], signature: Option<&str>) -> bool;
}

/// HMAC-SHA256 verifier keyed by the webhook token.
pub struct HmacVerifier {
    token: String,
}

impl HmacVerifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl SignatureVerifier for HmacVerifier {
    fn verify(&self, raw: &[u8], signature: Option<&str>) -> bool {
        match signature {
            Some(signature) => verify_signature(raw, signature, &self.token),
            None => {
                warn!("webhook_signature_missing");
                false
            }
        }
    }
}

/// Verify a hex HMAC-SHA256 `signature` of `raw` under `token`.
pub fn verify_signature(raw: &[u8], signature: &str, token: &str) -> bool {
    let signature = signature.trim();
    if token.is_empty() || signature.is_empty() {
        warn!(
            has_token = !token.is_empty(),
            has_signature = !signature.is_empty(),
            "webhook_signature_missing_fields"
        );
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(token.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };
    mac.update(raw);
    let expected = hex::encode(mac.finalize().into_bytes());

    let valid = constant_time_compare(&expected, &signature.to_ascii_lowercase());
    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "webhook_signature_mismatch"
        );
    }
    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(raw: &[u8], token: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(token.as_bytes()).unwrap();
        mac.update(raw);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"payload":{"resource_type":"workflow_run"}}"#;
        let signature = sign(body, "webhook-token");
        assert!(verify_signature(body, &signature, "webhook-token"));
        assert!(verify_signature(
            body,
            &signature.to_ascii_uppercase(),
            "webhook-token"
        ));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signature = sign(b"original", "webhook-token");
        assert!(!verify_signature(b"tampered", &signature, "webhook-token"));
    }

    #[test]
    fn test_wrong_token_rejected() {
        let signature = sign(b"body", "other-token");
        assert!(!verify_signature(b"body", &signature, "webhook-token"));
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(!verify_signature(b"body", "", "token"));
        assert!(!verify_signature(b"body", "abc", ""));
        assert!(!HmacVerifier::new("token").verify(b"body", None));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
