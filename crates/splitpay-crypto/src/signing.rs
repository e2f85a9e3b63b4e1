//! Gateway webhook signatures.
//!
//! The gateway signs `"{timestamp}.{body}"` with HMAC-SHA256 under a shared
//! secret and sends `t=<unix seconds>,v1=<hex>` in [`SIGNATURE_HEADER`].
//! Several `v1` entries may be present while a secret is being rotated.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// HTTP header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "splitpay-signature";

/// Default replay window in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn mac_for(secret: &[u8], timestamp: i64, payload: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Hex HMAC of `"{timestamp}.{payload}"`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(mac_for(secret.as_bytes(), timestamp, payload).finalize().into_bytes())
}

/// Full header value for a payload signed at `timestamp`.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!("t={},v1={}", timestamp, sign_payload(secret, timestamp, payload))
}

#[derive(Debug)]
struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, CryptoError> {
    let header = header.trim();
    if header.is_empty() {
        return Err(CryptoError::MalformedHeader("empty header".into()));
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or_else(|| CryptoError::MalformedHeader(format!("bad element: {part}")))?;
        match key {
            "t" => {
                let t = value
                    .parse::<i64>()
                    .map_err(|_| CryptoError::MalformedHeader(format!("bad timestamp: {value}")))?;
                timestamp = Some(t);
            }
            "v1" => {
                // Undecodable entries can never match; skip rather than fail the header.
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(CryptoError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(CryptoError::MissingSignature);
    }
    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

/// Verifies inbound webhook payloads against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
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
    pub fn new(secret: impl AsRef<str>, tolerance_secs: i64) -> Result<Self, CryptoError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
            tolerance_secs,
        })
    }

    pub fn tolerance_secs(&self) -> i64 {
        self.tolerance_secs
    }

    /// Verify `payload` against `header` using the current clock.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), CryptoError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify with an explicit `now` (unix seconds).
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), CryptoError> {
        let parsed = parse_header(header)?;

        // The header is unauthenticated here, so the timestamp may be any i64.
        if self.tolerance_secs > 0
            && now.abs_diff(parsed.timestamp) > self.tolerance_secs.unsigned_abs()
        {
            return Err(CryptoError::TimestampOutsideTolerance {
                age_secs: now.saturating_sub(parsed.timestamp),
                tolerance_secs: self.tolerance_secs,
            });
        }

        let mac = mac_for(&self.secret, parsed.timestamp, payload);
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
        if matched {
            Ok(())
        } else {
            Err(CryptoError::SignatureVerificationFailed)
        }
    }
}
