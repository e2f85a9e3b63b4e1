const IDEMPOTENCY_DOMAIN: &[u8] = b"splitpay/payout/v1";

/// Deterministic idempotency key for one payout leg of one payment request.
///
/// Retried attempts for the same `(payment_request_id, leg)` always produce the
/// same key, so a provider honouring it cannot transfer twice.
pub fn idempotency_key(payment_request_id: &str, leg: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(IDEMPOTENCY_DOMAIN);
    hasher.update(&[0]);
    hasher.update(payment_request_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(leg.as_bytes());
    let digest = hasher.finalize();
    format!("sp-{}-{}", leg, hex::encode(&digest.as_bytes()[..16]))
}
