use std::fmt;

use serde::{Deserialize, Serialize};
use splitpay_core::{Cents, PaymentRequest, PaymentStatus, PayoutStatus, RecipientId};

/// Which side of the split a payout leg pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegKind {
    /// The recipient's share, sent to their payout destination.
    Recipient,
    /// The platform fee, sent to the host payout destination.
    Platform,
}

impl LegKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recipient => "recipient",
            Self::Platform => "platform",
        }
    }

    /// Prefix used when this leg's failure is folded into the joint error.
    pub fn failure_label(&self) -> &'static str {
        match self {
            Self::Recipient => "Recipient payout failed",
            Self::Platform => "Platform payout failed",
        }
    }
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transfer handed to a payout provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub leg: LegKind,
    /// Provider-understood destination (an email address).
    pub destination: String,
    pub amount_cents: Cents,
    pub currency: String,
    pub note: String,
    /// Stable across retries of the same leg of the same request.
    pub idempotency_key: String,
}

/// Provider acknowledgement of an accepted transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub batch_ref: String,
    pub item_ref: Option<String>,
    /// The provider recognised the idempotency key and did not transfer again.
    pub replayed: bool,
}

/// What a recipient asks the gateway to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub recipient_id: RecipientId,
    pub amount_cents: Cents,
    pub currency: String,
    pub product_name: String,
    pub description: Option<String>,
}

/// Reusable hosted checkout created by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub checkout_ref: String,
    pub checkout_url: String,
}

/// Result of a single conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalUpdate {
    /// The condition held; carries the stored record.
    Applied(PaymentRequest),
    /// The condition did not hold; carries the record as it was.
    Rejected(PaymentRequest),
}

/// Result of a status-changing operation that is a no-op when already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Applied(PaymentRequest),
    Unchanged(PaymentRequest),
}

impl StatusChange {
    pub fn request(&self) -> &PaymentRequest {
        match self {
            Self::Applied(req) | Self::Unchanged(req) => req,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

impl From<ConditionalUpdate> for StatusChange {
    fn from(update: ConditionalUpdate) -> Self {
        match update {
            ConditionalUpdate::Applied(req) => Self::Applied(req),
            ConditionalUpdate::Rejected(req) => Self::Unchanged(req),
        }
    }
}

/// Result of asking for the payout claim. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller now holds `processing`.
    Claimed(PaymentRequest),
    /// Another attempt holds the claim.
    AlreadyInProgress,
    /// The request is not in a claimable state.
    NotEligible(String),
}

impl ClaimOutcome {
    /// Classify a request that failed the claim condition.
    pub fn from_rejected(req: &PaymentRequest) -> Self {
        match (req.status, req.payout_status) {
            (PaymentStatus::Paid, PayoutStatus::Processing) => Self::AlreadyInProgress,
            (PaymentStatus::Paid, PayoutStatus::Completed) => {
                Self::NotEligible("payout already completed".into())
            }
            (status, _) => Self::NotEligible(format!("payment request is {status}, not paid")),
        }
    }
}

/// Outcome of one payout leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegOutcome {
    pub leg: LegKind,
    pub amount_cents: Cents,
    pub batch_ref: Option<String>,
    pub error: Option<String>,
}

impl LegOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Final state of a claimed request after the orchestrator ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub payment_request: PaymentRequest,
    pub legs: Vec<LegOutcome>,
}

impl SettlementOutcome {
    pub fn is_completed(&self) -> bool {
        self.payment_request.payout_status == PayoutStatus::Completed
    }
}

/// Result of a payout trigger (webhook hand-off or manual).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutAttempt {
    Finished(SettlementOutcome),
    AlreadyInProgress,
    NotEligible(String),
}
