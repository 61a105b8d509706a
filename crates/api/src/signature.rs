//! Webhook signature verification.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the base64 HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

type HmacSha256 = Hmac<Sha256>;

/// Verifies a base64 signature over the raw body. The comparison is
/// constant-time (`Mac::verify_slice`).
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Computes the base64 signature for a body. Used by tests and by
/// integrations that send us signed payloads.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let signature = sign("secret", b"payload");
        assert!(verify("secret", b"payload", &signature));
    }

    #[test]
    fn test_rejects_tampered_body() {
        let signature = sign("secret", b"payload");
        assert!(!verify("secret", b"payload2", &signature));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let signature = sign("secret", b"payload");
        assert!(!verify("other", b"payload", &signature));
    }

    #[test]
    fn test_rejects_garbage_signature() {
        assert!(!verify("secret", b"payload", "not base64!!!"));
    }
}
