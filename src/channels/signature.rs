//! Webhook signature verification (HMAC-SHA256 over the raw request body).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::channels::email_types::EmailPayload;
use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded body signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

fn keyed_mac(secret: &str) -> Result<HmacSha256, WebhookError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSignature)
}

/// Hex-encoded HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = keyed_mac(secret)?;
    mac.update(body);
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

/// Check `signature` against `body` and parse the payload on success.
///
/// The comparison is constant-time. A `sha256=` prefix on the signature is accepted.
pub fn verify_webhook_signature(
    signature: &str,
    body: &[u8],
    secret: &str,
) -> Result<EmailPayload, WebhookError> {
    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let expected = decode_hex(signature).ok_or(WebhookError::InvalidSignature)?;

    let mut mac = keyed_mac(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)?;

    Ok(serde_json::from_slice(body)?)
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
