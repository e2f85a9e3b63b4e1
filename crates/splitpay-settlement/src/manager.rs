use std::sync::Arc;

use splitpay_core::{PaymentRequest, PaymentRequestId};

use crate::error::SettlementError;
use crate::orchestrator::PayoutOrchestrator;
use crate::reconciler::StatusReconciler;
use crate::traits::PaymentStore;
use crate::types::{ClaimOutcome, PayoutAttempt, SettlementOutcome};

/// Entry point for starting payouts, shared by the webhook hand-off and the
/// manual trigger.
pub struct SettlementManager {
    store: Arc<dyn PaymentStore>,
    reconciler: Arc<StatusReconciler>,
    orchestrator: Arc<PayoutOrchestrator>,
}

impl SettlementManager {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        reconciler: Arc<StatusReconciler>,
        orchestrator: Arc<PayoutOrchestrator>,
    ) -> Self {
        Self {
            store,
            reconciler,
            orchestrator,
        }
    }

    pub fn reconciler(&self) -> &Arc<StatusReconciler> {
        &self.reconciler
    }

    /// Claim the request and, if the claim is ours, settle it.
    pub async fn trigger_payout(
        &self,
        id: PaymentRequestId,
    ) -> Result<PayoutAttempt, SettlementError> {
        match self.reconciler.claim(id).await? {
            ClaimOutcome::Claimed(claimed) => {
                let outcome = self.settle_claimed(claimed).await?;
                Ok(PayoutAttempt::Finished(outcome))
            }
            ClaimOutcome::AlreadyInProgress => {
                tracing::info!(payment_request = %id, "Payout already in progress");
                Ok(PayoutAttempt::AlreadyInProgress)
            }
            ClaimOutcome::NotEligible(reason) => {
                tracing::info!(payment_request = %id, reason = %reason, "Payout not eligible");
                Ok(PayoutAttempt::NotEligible(reason))
            }
        }
    }

    /// Run the orchestrator for a request this caller has claimed.
    ///
    /// The run happens on its own task so that a caller dropping its future
    /// (for instance an HTTP client disconnecting) cannot strand the request
    /// in `processing`.
    pub async fn settle_claimed(
        &self,
        claimed: PaymentRequest,
    ) -> Result<SettlementOutcome, SettlementError> {
        let store = self.store.clone();
        let orchestrator = self.orchestrator.clone();
        let id = claimed.id;

        let handle = tokio::spawn(async move {
            match store.get_profile(&claimed.recipient_id).await {
                Ok(profile) => orchestrator.run(claimed, profile.as_ref()).await,
                Err(e) => {
                    tracing::error!(payment_request = %claimed.id, error = %e, "Failed to load payout profile");
                    let error = format!("Could not load payout profile: {e}");
                    orchestrator.fail(&claimed, error).await
                }
            }
        });

        handle.await.map_err(|e| {
            tracing::error!(payment_request = %id, error = %e, "Payout task aborted");
            SettlementError::Internal(format!("payout task for {id} aborted: {e}"))
        })?
    }
}
