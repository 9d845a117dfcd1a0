//! Verification of signed webhook deliveries.
//!
//! The mail provider signs every delivery Svix-style: the HMAC-SHA256 of
//! `{id}.{timestamp}.{body}`, keyed with the base64 part of the `whsec_`
//! secret, sent as one or more space-separated `v1,<base64>` entries.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use ring::hmac;
use thiserror::Error;

const SECRET_PREFIX: &str = "whsec_";

/// Reasons a delivery is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("webhook secret is not valid base64")]
    InvalidSecret,

    #[error("missing header {0}")]
    MissingHeader(&'static str),

    #[error("invalid timestamp header")]
    InvalidTimestamp,

    #[error("timestamp outside the accepted window")]
    TimestampOutOfRange,

    #[error("no matching signature")]
    Mismatch,
}

/// Checks webhook signatures against the shared secret.
pub struct WebhookVerifier {
    key: hmac::Key,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Creates a verifier from a `whsec_...` secret.
    pub fn new(secret: &str, tolerance_secs: i64) -> Result<Self, SignatureError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key_bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| SignatureError::InvalidSecret)?;

        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, &key_bytes),
            tolerance_secs,
        })
    }

    /// Verifies a delivery received now.
    pub fn verify(
        &self,
        id: &str,
        timestamp: &str,
        signatures: &str,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(id, timestamp, signatures, body, Utc::now())
    }

    /// Verifies a delivery as of `now`.
    pub fn verify_at(
        &self,
        id: &str,
        timestamp: &str,
        signatures: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if now.timestamp().abs_diff(sent_at) > self.tolerance_secs.unsigned_abs() {
            return Err(SignatureError::TimestampOutOfRange);
        }

        let payload = signed_payload(id, timestamp.trim(), body);

        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .filter_map(|(_, signature)| STANDARD.decode(signature).ok())
            .any(|signature| hmac::verify(&self.key, &payload, &signature).is_ok());

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Produces the `v1,<base64>` signature for a payload.
    pub fn sign(&self, id: &str, timestamp: &str, body: &[u8]) -> String {
        let tag = hmac::sign(&self.key, &signed_payload(id, timestamp, body));
        format!("v1,{}", STANDARD.encode(tag.as_ref()))
    }
}

fn signed_payload(id: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(id.len() + timestamp.len() + body.len() + 2);
    payload.extend_from_slice(id.as_bytes());
    payload.push(b'.');
    payload.extend_from_slice(timestamp.as_bytes());
    payload.push(b'.');
    payload.extend_from_slice(body);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // base64("intake-test-secret")
    const SECRET: &str = "whsec_aW50YWtlLXRlc3Qtc2VjcmV0";
    const BODY: &[u8] = br#"{"type":"email.received","data":{"email_id":"re-1"}}"#;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_736_870_400, 0).unwrap()
    }

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SECRET, 300).unwrap()
    }

    #[test]
    fn accepts_valid_signature() {
        let verifier = verifier();
        let signature = verifier.sign("msg_1", "1736870400", BODY);
        assert_eq!(
            verifier.verify_at("msg_1", "1736870400", &signature, BODY, now()),
            Ok(())
        );
    }

    #[test]
    fn accepts_any_matching_entry() {
        let verifier = verifier();
        let good = verifier.sign("msg_1", "1736870400", BODY);
        let header = format!("v1,AAAA {good}");
        assert!(verifier
            .verify_at("msg_1", "1736870400", &header, BODY, now())
            .is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let verifier = verifier();
        let signature = verifier.sign("msg_1", "1736870400", BODY);
        assert_eq!(
            verifier.verify_at("msg_1", "1736870400", &signature, b"{}", now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_other_secret() {
        let other = WebhookVerifier::new("whsec_b3RoZXI=", 300).unwrap();
        let signature = other.sign("msg_1", "1736870400", BODY);
        assert_eq!(
            verifier().verify_at("msg_1", "1736870400", &signature, BODY, now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_and_future_timestamps() {
        let verifier = verifier();
        for timestamp in ["1736870099", "1736870701"] {
            let signature = verifier.sign("msg_1", timestamp, BODY);
            assert_eq!(
                verifier.verify_at("msg_1", timestamp, &signature, BODY, now()),
                Err(SignatureError::TimestampOutOfRange)
            );
        }
    }

    #[test]
    fn rejects_extreme_timestamps() {
        let verifier = verifier();
        for timestamp in ["-9223372036854775808", "9223372036854775807"] {
            assert_eq!(
                verifier.verify_at("msg_1", timestamp, "v1,AAAA", b"{}", now()),
                Err(SignatureError::TimestampOutOfRange)
            );
        }
        assert_eq!(
            verifier.verify("msg_1", "-9223372036854775808", "v1,AAAA", b"{}"),
            Err(SignatureError::TimestampOutOfRange)
        );
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert_eq!(
            verifier().verify_at("msg_1", "yesterday", "v1,AAAA", BODY, now()),
            Err(SignatureError::InvalidTimestamp)
        );
    }

    #[test]
    fn invalid_secret_is_rejected() {
        assert!(matches!(
            WebhookVerifier::new("whsec_!!!", 300),
            Err(SignatureError::InvalidSecret)
        ));
    }
}
