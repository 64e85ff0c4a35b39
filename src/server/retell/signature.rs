//! Retell webhook signatures
//!
//! The `x-retell-signature` header has the form `v=<unix millis>,d=<hex>`,
//! where the digest is HMAC-SHA256 over the raw body followed by the
//! timestamp, keyed with the shared secret.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-retell-signature";

/// Maximum clock skew accepted between the signer and this server.
pub const SIGNATURE_TOLERANCE_MS: i64 = 5 * 60 * 1000;

/// Verify a webhook signature against the current time.
pub fn verify(body: &[u8], secret: &str, signature: &str) -> bool {
    verify_at(body, secret, signature, Utc::now().timestamp_millis())
}

pub fn verify_at(body: &[u8], secret: &str, signature: &str, now_ms: i64) -> bool {
    let Some((timestamp, digest)) = parse_header(signature) else {
        return false;
    };

    if (now_ms - timestamp).abs() > SIGNATURE_TOLERANCE_MS {
        tracing::warn!(timestamp, now_ms, "Webhook signature outside tolerance window");
        return false;
    }

    let Ok(expected) = hex::decode(digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.update(timestamp.to_string().as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Produce a header value the way the provider signs deliveries.
pub fn sign(body: &[u8], secret: &str, timestamp_ms: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.update(timestamp_ms.to_string().as_bytes());
    format!("v={},d={}", timestamp_ms, hex::encode(mac.finalize().into_bytes()))
}

fn parse_header(signature: &str) -> Option<(i64, &str)> {
    let mut timestamp = None;
    let mut digest = None;

    for part in signature.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("v=") {
            timestamp = v.parse::<i64>().ok();
        } else if let Some(d) = part.strip_prefix("d=") {
            digest = Some(d);
        }
    }

    Some((timestamp?, digest.filter(|d| !d.is_empty())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "key_test_secret";
    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"event":"call_started","call":{"call_id":"abc"}}"#;
        let header = sign(body, SECRET, NOW);
        assert!(verify_at(body, SECRET, &header, NOW));
        assert!(verify_at(body, SECRET, &header, NOW + 60_000));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(b"{\"call_id\":\"abc\"}", SECRET, NOW);
        assert!(!verify_at(b"{\"call_id\":\"abd\"}", SECRET, &header, NOW));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{}";
        let header = sign(body, "other_secret", NOW);
        assert!(!verify_at(body, SECRET, &header, NOW));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = b"{}";
        let header = sign(body, SECRET, NOW);
        assert!(!verify_at(body, SECRET, &header, NOW + SIGNATURE_TOLERANCE_MS + 1));
        assert!(!verify_at(body, SECRET, &header, NOW - SIGNATURE_TOLERANCE_MS - 1));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let body = b"{}";
        for header in ["", "garbage", "v=abc,d=00", "v=1700000000000", "d=deadbeef", "v=1700000000000,d=not-hex"] {
            assert!(!verify_at(body, SECRET, header, NOW), "accepted {:?}", header);
        }
    }
}
