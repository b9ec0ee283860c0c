//! Shared-secret signatures on webhook bodies.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex digest>` of the raw body.
pub const SIGNATURE_HEADER: &str = "x-signature-256";

/// Check an HMAC-SHA256 signature of `payload`.
///
/// Accepts `sha256=<hex>` or bare `<hex>`. An empty secret accepts
/// everything. Comparison is constant-time.
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return true;
    }

    let sig_hex = signature.trim();
    let sig_hex = sig_hex.strip_prefix("sha256=").unwrap_or(sig_hex);
    let Ok(provided) = hex::decode(sig_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

/// The header value a sender would attach for `payload`.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(payload);
            format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
        }
        Err(_) => String::new(),
    }
}
