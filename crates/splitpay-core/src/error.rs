use crate::state_machine::{PaymentStatus, PayoutStatus};

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid payment transition from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("invalid payout transition from {from} to {to}")]
    InvalidPayoutTransition {
        from: PayoutStatus,
        to: PayoutStatus,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("invalid platform config: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
