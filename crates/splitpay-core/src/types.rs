use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;
use crate::fee::FeeSplit;
use crate::state_machine::{
    PaymentEvent, PaymentStateMachine, PaymentStatus, PayoutEvent, PayoutStateMachine,
    PayoutStatus,
};

/// Money in the smallest currency unit.
pub type Cents = i64;

/// Unique identifier for a payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentRequestId(pub Uuid);

impl PaymentRequestId {
    /// Create a new time-ordered identifier (UUID v7).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PaymentRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaymentRequestId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::InvalidId(s.to_string()))
    }
}

/// Identifier of the user who owns a payment request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub String);

impl RecipientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a recipient's payouts are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientPayoutProfile {
    pub recipient_id: RecipientId,
    /// Email address understood by the payout provider.
    pub payout_destination: Option<String>,
    pub destination_verified: bool,
    pub display_name: Option<String>,
}

impl RecipientPayoutProfile {
    pub fn new(recipient_id: RecipientId) -> Self {
        Self {
            recipient_id,
            payout_destination: None,
            destination_verified: false,
            display_name: None,
        }
    }

    /// Set the destination after validating its format. Saved destinations are
    /// treated as verified; deeper checks belong to the payout provider.
    pub fn with_destination(mut self, destination: &str) -> Result<Self, CoreError> {
        let destination = destination.trim();
        if !is_valid_payout_email(destination) {
            return Err(CoreError::ValidationError(format!(
                "invalid payout destination: {destination}"
            )));
        }
        self.payout_destination = Some(destination.to_string());
        self.destination_verified = true;
        Ok(self)
    }

    pub fn destination(&self) -> Option<&str> {
        self.payout_destination.as_deref().filter(|d| !d.is_empty())
    }
}

/// Details recorded on the `pending → paid` transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidDetails {
    pub session_id: String,
    pub payer_identifier: Option<String>,
    pub paid_at: DateTime<Utc>,
}

/// Final outcome of one payout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum PayoutResolution {
    Completed {
        payout_ref: String,
        platform_ref: Option<String>,
        completed_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        /// Reference of a leg that did go through, for manual reconciliation.
        payout_ref: Option<String>,
        platform_ref: Option<String>,
    },
}

/// One request for funds and its settlement outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: PaymentRequestId,
    pub recipient_id: RecipientId,
    pub amount_cents: Cents,
    pub description: Option<String>,
    pub external_checkout_ref: String,
    pub checkout_url: String,
    pub status: PaymentStatus,
    pub checkout_session_id: Option<String>,
    pub paid_by_identifier: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payout_status: PayoutStatus,
    pub platform_fee_cents: Option<Cents>,
    pub payout_amount_cents: Option<Cents>,
    pub payout_provider_ref: Option<String>,
    pub platform_payout_ref: Option<String>,
    pub payout_completed_at: Option<DateTime<Utc>>,
    pub payout_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// Create a pending request for an issued checkout session.
    pub fn new(
        recipient_id: RecipientId,
        amount_cents: Cents,
        description: Option<String>,
        external_checkout_ref: String,
        checkout_url: String,
    ) -> Result<Self, CoreError> {
        if amount_cents <= 0 {
            return Err(CoreError::InvalidAmount(format!(
                "amount must be positive, got {amount_cents}"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: PaymentRequestId::new(),
            recipient_id,
            amount_cents,
            description,
            external_checkout_ref,
            checkout_url,
            status: PaymentStatus::Pending,
            checkout_session_id: None,
            paid_by_identifier: None,
            paid_at: None,
            payout_status: PayoutStatus::Unset,
            platform_fee_cents: None,
            payout_amount_cents: None,
            payout_provider_ref: None,
            platform_payout_ref: None,
            payout_completed_at: None,
            payout_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Description used in payout notes.
    pub fn note_subject(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or("QR Code Payment")
    }

    pub fn fee_split(&self) -> Option<FeeSplit> {
        match (self.platform_fee_cents, self.payout_amount_cents) {
            (Some(platform_fee_cents), Some(payout_amount_cents)) => Some(FeeSplit {
                platform_fee_cents,
                payout_amount_cents,
            }),
            _ => None,
        }
    }

    /// `pending → paid`, recording payer details and opening the payout sub-state.
    pub fn apply_paid(&self, details: &PaidDetails) -> Result<Self, CoreError> {
        let status = PaymentStateMachine::transition(self.status, PaymentEvent::CheckoutCompleted)?;
        let payout_status =
            PayoutStateMachine::transition(self.payout_status, PayoutEvent::PaymentCollected)?;
        let mut next = self.clone();
        next.status = status;
        next.payout_status = payout_status;
        next.checkout_session_id = Some(details.session_id.clone());
        next.paid_by_identifier = details.payer_identifier.clone();
        next.paid_at = Some(details.paid_at);
        next.updated_at = Utc::now();
        Ok(next)
    }

    /// `pending → expired` or `pending → cancelled`.
    pub fn apply_withdrawal(&self, event: PaymentEvent) -> Result<Self, CoreError> {
        if event == PaymentEvent::CheckoutCompleted {
            return Err(CoreError::ValidationError(
                "checkout completion must go through apply_paid".into(),
            ));
        }
        let mut next = self.clone();
        next.status = PaymentStateMachine::transition(self.status, event)?;
        next.updated_at = Utc::now();
        Ok(next)
    }

    /// Take the payout claim: requires `paid` and a claimable payout status.
    pub fn apply_claim(&self) -> Result<Self, CoreError> {
        if self.status != PaymentStatus::Paid {
            return Err(CoreError::ValidationError(format!(
                "payment request is {}, not paid",
                self.status
            )));
        }
        let mut next = self.clone();
        next.payout_status = PayoutStateMachine::transition(self.payout_status, PayoutEvent::Claimed)?;
        next.updated_at = Utc::now();
        Ok(next)
    }

    /// Persist the fee split unless one is already recorded.
    pub fn apply_fee_split(&self, split: FeeSplit) -> Option<Self> {
        if self.fee_split().is_some() {
            return None;
        }
        let mut next = self.clone();
        next.platform_fee_cents = Some(split.platform_fee_cents);
        next.payout_amount_cents = Some(split.payout_amount_cents);
        next.updated_at = Utc::now();
        Some(next)
    }

    /// `processing → completed | failed`.
    pub fn apply_resolution(&self, resolution: &PayoutResolution) -> Result<Self, CoreError> {
        let mut next = self.clone();
        match resolution {
            PayoutResolution::Completed {
                payout_ref,
                platform_ref,
                completed_at,
            } => {
                let split = self.fee_split().ok_or_else(|| {
                    CoreError::ValidationError("cannot complete payout without a fee split".into())
                })?;
                if split.platform_fee_cents > 0 && platform_ref.is_none() {
                    return Err(CoreError::ValidationError(
                        "cannot complete payout without the platform leg reference".into(),
                    ));
                }
                next.payout_status =
                    PayoutStateMachine::transition(self.payout_status, PayoutEvent::Succeeded)?;
                next.payout_provider_ref = Some(payout_ref.clone());
                next.platform_payout_ref = platform_ref.clone();
                next.payout_completed_at = Some(*completed_at);
                next.payout_error = None;
            }
            PayoutResolution::Failed {
                error,
                payout_ref,
                platform_ref,
            } => {
                next.payout_status =
                    PayoutStateMachine::transition(self.payout_status, PayoutEvent::Failed)?;
                next.payout_error = Some(error.clone());
                if payout_ref.is_some() {
                    next.payout_provider_ref = payout_ref.clone();
                }
                if platform_ref.is_some() {
                    next.platform_payout_ref = platform_ref.clone();
                }
            }
        }
        next.updated_at = Utc::now();
        Ok(next)
    }
}

/// Loose email check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_valid_payout_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = candidate.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
