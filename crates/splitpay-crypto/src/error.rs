/// Errors from webhook signature handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("webhook secret must not be empty")]
    EmptySecret,

    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    #[error("signature header has no timestamp")]
    MissingTimestamp,

    #[error("signature header has no v1 signature")]
    MissingSignature,

    #[error("timestamp outside tolerance: {age_secs}s old, tolerance {tolerance_secs}s")]
    TimestampOutsideTolerance { age_secs: i64, tolerance_secs: i64 },

    #[error("signature verification failed")]
    SignatureVerificationFailed,
}
