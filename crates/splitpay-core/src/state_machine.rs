use std::fmt;

use crate::error::CoreError;

/// Lifecycle status of a payment request's collection leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Link issued, awaiting the payer.
    Pending,
    /// Gateway confirmed checkout completion. Never reversed.
    Paid,
    /// Checkout link deactivated while still unpaid. Final state.
    Expired,
    /// Withdrawn by the recipient before payment. Final state.
    Cancelled,
}

impl PaymentStatus {
    /// Whether no further payment-leg transition is possible.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement sub-state, meaningful only once the request is `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    /// No payment collected yet.
    #[default]
    Unset,
    /// Payment collected, payout not yet attempted.
    Pending,
    /// A payout attempt holds the claim.
    Processing,
    /// Every required leg succeeded.
    Completed,
    /// The last attempt failed; retriable through a new claim.
    Failed,
}

impl PayoutStatus {
    /// Whether a new payout attempt may claim this request.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Unset | Self::Pending | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move a payment request's collection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    /// Verified gateway notification that checkout completed.
    CheckoutCompleted,
    /// Gateway notification that the checkout link was deactivated.
    LinkDeactivated,
    /// Explicit recipient cancellation.
    Cancelled,
}

impl PaymentEvent {
    fn target(&self) -> PaymentStatus {
        match self {
            Self::CheckoutCompleted => PaymentStatus::Paid,
            Self::LinkDeactivated => PaymentStatus::Expired,
            Self::Cancelled => PaymentStatus::Cancelled,
        }
    }
}

/// Collection-leg transitions.
///
/// Valid transitions:
/// - Pending → Paid (CheckoutCompleted)
/// - Pending → Expired (LinkDeactivated)
/// - Pending → Cancelled (Cancelled)
///
/// Every event applied to a non-pending request is rejected; callers treat
/// that rejection as a logged no-op.
pub struct PaymentStateMachine;

impl PaymentStateMachine {
    pub fn transition(
        current: PaymentStatus,
        event: PaymentEvent,
    ) -> Result<PaymentStatus, CoreError> {
        let next = match (current, event) {
            (PaymentStatus::Pending, event) => event.target(),
            _ => {
                return Err(CoreError::InvalidPaymentTransition {
                    from: current,
                    to: event.target(),
                });
            }
        };

        tracing::debug!(from = %current, to = %next, event = ?event, "payment status transition");
        Ok(next)
    }

    pub fn can_transition(current: PaymentStatus, event: PaymentEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}

/// Events that move the payout sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutEvent {
    /// Funds were collected; a payout is now owed.
    PaymentCollected,
    /// A payout attempt took the claim.
    Claimed,
    /// All required legs succeeded.
    Succeeded,
    /// At least one required leg failed.
    Failed,
}

/// Payout sub-state transitions.
///
/// Valid transitions:
/// - Unset → Pending (PaymentCollected)
/// - Unset | Pending | Failed → Processing (Claimed)
/// - Processing → Completed (Succeeded)
/// - Processing → Failed (Failed)
pub struct PayoutStateMachine;

impl PayoutStateMachine {
    pub fn transition(current: PayoutStatus, event: PayoutEvent) -> Result<PayoutStatus, CoreError> {
        let next = match (current, event) {
            (PayoutStatus::Unset, PayoutEvent::PaymentCollected) => PayoutStatus::Pending,
            (status, PayoutEvent::Claimed) if status.is_claimable() => PayoutStatus::Processing,
            (PayoutStatus::Processing, PayoutEvent::Succeeded) => PayoutStatus::Completed,
            (PayoutStatus::Processing, PayoutEvent::Failed) => PayoutStatus::Failed,
            _ => {
                let to = match event {
                    PayoutEvent::PaymentCollected => PayoutStatus::Pending,
                    PayoutEvent::Claimed => PayoutStatus::Processing,
                    PayoutEvent::Succeeded => PayoutStatus::Completed,
                    PayoutEvent::Failed => PayoutStatus::Failed,
                };
                return Err(CoreError::InvalidPayoutTransition { from: current, to });
            }
        };

        tracing::debug!(from = %current, to = %next, event = ?event, "payout status transition");
        Ok(next)
    }
}
