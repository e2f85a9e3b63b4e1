use std::time::Duration;

use splitpay_core::{CoreError, PaymentRequestId, RecipientId};
use splitpay_crypto::CryptoError;

/// Settlement-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("payment request not found: {0}")]
    NotFound(PaymentRequestId),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("webhook authentication failed: {0}")]
    Unauthorized(#[from] CryptoError),

    #[error("malformed webhook event: {0}")]
    MalformedEvent(String),

    #[error("recipient {0} has no payout destination configured")]
    MissingPayoutDestination(RecipientId),

    #[error("recipient {recipient} does not own payment request {id}")]
    Forbidden {
        id: PaymentRequestId,
        recipient: RecipientId,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("checkout gateway error: {0}")]
    Gateway(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for SettlementError {
    fn from(err: serde_json::Error) -> Self {
        SettlementError::MalformedEvent(err.to_string())
    }
}

/// Failure of a single payout leg.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    #[error("invalid payout instruction: {0}")]
    InvalidInstruction(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("provider rejected payout (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<reqwest::Error> for PayoutError {
    fn from(err: reqwest::Error) -> Self {
        PayoutError::Transport(err.to_string())
    }
}
