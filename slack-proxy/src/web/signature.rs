//! Slack request signature verification.
//!
//! Slack signs every request with HMAC-SHA256 over `v0:{timestamp}:{body}`.
//! Reference: https://api.slack.com/authentication/verifying-requests-from-slack

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Version tag prepended to both the base string and the signature.
pub const SIGNATURE_VERSION: &str = "v0";

/// Slack signing secret.
///
/// Held as raw bytes and never printed; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    /// Wrap a secret, returning `None` when it is empty.
    pub fn new(secret: impl Into<Vec<u8>>) -> Option<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            None
        } else {
            Some(Self(secret))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Compute the signature Slack would send for this timestamp and body.
///
/// The base string is built from the literal body bytes; nothing is trimmed
/// or re-encoded.
pub fn expected_signature(secret: &[u8], timestamp: &str, raw_body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");

    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(raw_body);

    format!(
        "{}={}",
        SIGNATURE_VERSION,
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Verify a Slack request signature.
///
/// # Arguments
///
/// * `secret` - The Slack app signing secret
/// * `timestamp` - The `X-Slack-Request-Timestamp` header value
/// * `raw_body` - The exact bytes received
/// * `supplied` - The `X-Slack-Signature` header value
///
/// # Returns
///
/// `true` only if `supplied` matches byte for byte. The comparison runs in
/// constant time; a length mismatch returns `false`. Freshness of the
/// timestamp is not checked here, see [`is_timestamp_fresh`].
pub fn verify_slack_signature(
    secret: &[u8],
    timestamp: &str,
    raw_body: &[u8],
    supplied: &str,
) -> bool {
    let expected = expected_signature(secret, timestamp, raw_body);
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Check that a request timestamp lies within `max_age_seconds` of `now`.
///
/// Timestamps in the future are measured the same way as past ones.
/// Unparseable timestamps are never fresh.
pub fn is_timestamp_fresh(timestamp: &str, max_age_seconds: u64, now: u64) -> bool {
    let request_time: u64 = match timestamp.trim().parse() {
        Ok(t) => t,
        Err(_) => return false,
    };

    now.abs_diff(request_time) <= max_age_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"8f742231b10e8888abcd99yyyzzz85a5";
    const TIMESTAMP: &str = "1531420618";
    const BODY: &[u8] = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";

    #[test]
    fn test_expected_signature_matches_slack_documentation() {
        assert_eq!(
            expected_signature(SECRET, TIMESTAMP, BODY),
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503"
        );
    }

    #[test]
    fn test_verify_signature_valid() {
        let signature = expected_signature(SECRET, TIMESTAMP, BODY);
        assert!(verify_slack_signature(SECRET, TIMESTAMP, BODY, &signature));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let signature = expected_signature(b"another-secret", TIMESTAMP, BODY);
        assert!(!verify_slack_signature(SECRET, TIMESTAMP, BODY, &signature));
    }

    #[test]
    fn test_verify_signature_single_character_flip() {
        let signature = expected_signature(SECRET, TIMESTAMP, BODY);

        for i in 0..signature.len() {
            let mut bytes = signature.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(
                !verify_slack_signature(SECRET, TIMESTAMP, BODY, &tampered),
                "flip at {} accepted",
                i
            );
        }
    }

    #[test]
    fn test_verify_signature_length_mismatch() {
        let signature = expected_signature(SECRET, TIMESTAMP, BODY);
        assert!(!verify_slack_signature(
            SECRET,
            TIMESTAMP,
            BODY,
            &signature[..signature.len() - 1]
        ));
        assert!(!verify_slack_signature(
            SECRET,
            TIMESTAMP,
            BODY,
            &format!("{}0", signature)
        ));
        assert!(!verify_slack_signature(SECRET, TIMESTAMP, BODY, ""));
    }

    #[test]
    fn test_verify_signature_uses_raw_body_bytes() {
        let body = br#"{"type": "event_callback", "text": "hi" }"#;
        let trimmed = br#"{"type": "event_callback", "text": "hi"}"#;
        let signature = expected_signature(SECRET, TIMESTAMP, trimmed);
        assert!(!verify_slack_signature(SECRET, TIMESTAMP, body, &signature));
    }

    #[test]
    fn test_verify_signature_timestamp_is_signed() {
        let signature = expected_signature(SECRET, TIMESTAMP, BODY);
        assert!(!verify_slack_signature(SECRET, "1531420619", BODY, &signature));
    }

    #[test]
    fn test_verify_signature_non_utf8_body() {
        let body = [0xff, 0xfe, 0x00, 0x7b];
        let signature = expected_signature(SECRET, TIMESTAMP, &body);
        assert!(verify_slack_signature(SECRET, TIMESTAMP, &body, &signature));
    }

    #[test]
    fn test_expected_signature_accepts_any_key_length() {
        let long_key = vec![0x5a; 1024];
        for key in [&b"k"[..], SECRET, &long_key[..]] {
            let signature = expected_signature(key, TIMESTAMP, BODY);
            assert!(signature.starts_with("v0="));
            assert_eq!(signature.len(), 3 + 64);
            assert!(verify_slack_signature(key, TIMESTAMP, BODY, &signature));
        }
    }

    #[test]
    fn test_signing_secret_rejects_empty() {
        assert!(SigningSecret::new("").is_none());
        assert!(SigningSecret::new(Vec::<u8>::new()).is_none());
        assert_eq!(SigningSecret::new("abc").unwrap().as_bytes(), b"abc");
    }

    #[test]
    fn test_signing_secret_debug_is_redacted() {
        let secret = SigningSecret::new("super-secret").unwrap();
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn test_timestamp_freshness() {
        let now = 1_700_000_000;
        assert!(is_timestamp_fresh("1700000000", 300, now));
        assert!(is_timestamp_fresh("1699999700", 300, now));
        assert!(is_timestamp_fresh("1700000300", 300, now));
        assert!(!is_timestamp_fresh("1699999699", 300, now));
        assert!(!is_timestamp_fresh("1700000301", 300, now));
        assert!(!is_timestamp_fresh("not-a-number", 300, now));
        assert!(!is_timestamp_fresh("", 300, now));
    }
}
