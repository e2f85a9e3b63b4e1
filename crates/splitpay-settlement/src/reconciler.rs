//! All status writes for payment requests.
//!
//! Every transition goes through [`PaymentStore::update_if`] with a condition
//! on the current status, so duplicate or concurrent callers collapse into a
//! single applied change and the rest observe a no-op.

use std::sync::Arc;

use splitpay_core::{
    FeeSplit, PaidDetails, PaymentEvent, PaymentRequest, PaymentRequestId, PayoutResolution,
    PayoutStatus, RecipientId,
};

use crate::error::SettlementError;
use crate::traits::PaymentStore;
use crate::types::{ClaimOutcome, ConditionalUpdate, StatusChange};

pub struct StatusReconciler {
    store: Arc<dyn PaymentStore>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PaymentStore> {
        &self.store
    }

    /// `pending → paid`. A request already past pending is left untouched.
    pub async fn mark_paid(
        &self,
        id: PaymentRequestId,
        details: &PaidDetails,
    ) -> Result<StatusChange, SettlementError> {
        let update = |req: &PaymentRequest| req.apply_paid(details).ok();
        let change: StatusChange = self.store.update_if(id, &update).await?.into();
        match &change {
            StatusChange::Applied(req) => {
                tracing::info!(
                    payment_request = %id,
                    session_id = %details.session_id,
                    amount_cents = req.amount_cents,
                    "Payment request marked paid"
                );
            }
            StatusChange::Unchanged(req) => {
                tracing::info!(
                    payment_request = %id,
                    status = %req.status,
                    "Checkout completion ignored, request no longer pending"
                );
            }
        }
        Ok(change)
    }

    /// `pending → expired`. No-op for any other status.
    pub async fn expire(&self, id: PaymentRequestId) -> Result<StatusChange, SettlementError> {
        let update = |req: &PaymentRequest| req.apply_withdrawal(PaymentEvent::LinkDeactivated).ok();
        let change: StatusChange = self.store.update_if(id, &update).await?.into();
        tracing::info!(
            payment_request = %id,
            applied = change.is_applied(),
            status = %change.request().status,
            "Checkout link deactivated"
        );
        Ok(change)
    }

    /// `pending → cancelled`, only for the owning recipient.
    pub async fn cancel(
        &self,
        id: PaymentRequestId,
        recipient: &RecipientId,
    ) -> Result<StatusChange, SettlementError> {
        let update = |req: &PaymentRequest| {
            if &req.recipient_id != recipient {
                return None;
            }
            req.apply_withdrawal(PaymentEvent::Cancelled).ok()
        };
        let change: StatusChange = self.store.update_if(id, &update).await?.into();
        if &change.request().recipient_id != recipient {
            tracing::warn!(
                target: "splitpay::security",
                payment_request = %id,
                recipient = %recipient,
                "Cancellation attempted by non-owner"
            );
            return Err(SettlementError::Forbidden {
                id,
                recipient: recipient.clone(),
            });
        }
        tracing::info!(
            payment_request = %id,
            applied = change.is_applied(),
            status = %change.request().status,
            "Cancellation processed"
        );
        Ok(change)
    }

    /// Take the payout claim. Exactly one of any number of concurrent callers
    /// observes [`ClaimOutcome::Claimed`].
    pub async fn claim(&self, id: PaymentRequestId) -> Result<ClaimOutcome, SettlementError> {
        let update = |req: &PaymentRequest| req.apply_claim().ok();
        match self.store.update_if(id, &update).await? {
            ConditionalUpdate::Applied(req) => {
                tracing::info!(payment_request = %id, "Payout claim acquired");
                Ok(ClaimOutcome::Claimed(req))
            }
            ConditionalUpdate::Rejected(req) => {
                let outcome = ClaimOutcome::from_rejected(&req);
                tracing::debug!(
                    payment_request = %id,
                    payout_status = %req.payout_status,
                    outcome = ?outcome,
                    "Payout claim not acquired"
                );
                Ok(outcome)
            }
        }
    }

    /// Persist the fee split of a claimed request. If a split was already
    /// recorded by an earlier attempt, that split is returned unchanged.
    pub async fn record_fee_split(
        &self,
        id: PaymentRequestId,
        split: FeeSplit,
    ) -> Result<FeeSplit, SettlementError> {
        let update = |req: &PaymentRequest| {
            if req.payout_status != PayoutStatus::Processing {
                return None;
            }
            req.apply_fee_split(split)
        };
        match self.store.update_if(id, &update).await? {
            ConditionalUpdate::Applied(_) => Ok(split),
            ConditionalUpdate::Rejected(req) => match req.fee_split() {
                Some(existing) if req.payout_status == PayoutStatus::Processing => Ok(existing),
                _ => Err(SettlementError::Conflict(format!(
                    "payment request {id} is not held for payout (payout status {})",
                    req.payout_status
                ))),
            },
        }
    }

    /// `processing → completed | failed`.
    pub async fn finish(
        &self,
        id: PaymentRequestId,
        resolution: &PayoutResolution,
    ) -> Result<PaymentRequest, SettlementError> {
        let update = |req: &PaymentRequest| req.apply_resolution(resolution).ok();
        match self.store.update_if(id, &update).await? {
            ConditionalUpdate::Applied(req) => Ok(req),
            ConditionalUpdate::Rejected(req) => Err(SettlementError::Conflict(format!(
                "cannot record payout outcome for {id}: payout status is {}",
                req.payout_status
            ))),
        }
    }
}
