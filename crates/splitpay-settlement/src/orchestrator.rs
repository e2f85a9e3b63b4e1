//! Two-leg payout execution for a claimed payment request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use splitpay_core::{
    calculate_fee_split, Cents, PaymentRequest, PayoutResolution, PayoutStatus, PlatformConfig,
    RecipientPayoutProfile,
};
use splitpay_crypto::idempotency_key;

use crate::error::{PayoutError, SettlementError};
use crate::reconciler::StatusReconciler;
use crate::traits::PayoutProvider;
use crate::types::{LegKind, LegOutcome, PayoutInstruction, PayoutReceipt, SettlementOutcome};

/// Default bound on a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs the recipient and platform legs of a claimed request and records the
/// joint outcome.
///
/// The orchestrator never takes the claim itself; it is handed a request
/// already in `processing` and always leaves it `completed` or `failed`.
pub struct PayoutOrchestrator {
    reconciler: Arc<StatusReconciler>,
    provider: Arc<dyn PayoutProvider>,
    platform: Arc<PlatformConfig>,
    provider_timeout: Duration,
}

impl PayoutOrchestrator {
    pub fn new(
        reconciler: Arc<StatusReconciler>,
        provider: Arc<dyn PayoutProvider>,
        platform: Arc<PlatformConfig>,
    ) -> Self {
        Self {
            reconciler,
            provider,
            platform,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Settle a claimed request.
    pub async fn run(
        &self,
        claimed: PaymentRequest,
        profile: Option<&RecipientPayoutProfile>,
    ) -> Result<SettlementOutcome, SettlementError> {
        if claimed.payout_status != PayoutStatus::Processing {
            return Err(SettlementError::Conflict(format!(
                "payment request {} is not held for payout (payout status {})",
                claimed.id, claimed.payout_status
            )));
        }

        let Some(destination) = profile.and_then(|p| p.destination()) else {
            tracing::error!(
                payment_request = %claimed.id,
                recipient = %claimed.recipient_id,
                "Recipient has no payout destination, failing payout"
            );
            let error = format!(
                "Configuration error: recipient {} has no payout destination",
                claimed.recipient_id
            );
            return self.fail(&claimed, error).await;
        };

        let split = match calculate_fee_split(claimed.amount_cents, &self.platform) {
            Ok(split) => split,
            Err(e) => return self.fail(&claimed, format!("Fee calculation failed: {e}")).await,
        };
        let split = match self.reconciler.record_fee_split(claimed.id, split).await {
            Ok(split) => split,
            Err(e) => {
                tracing::error!(
                    payment_request = %claimed.id,
                    error = %e,
                    "Failed to record fee split"
                );
                // Release the claim so a later trigger can retry.
                let error = format!("Could not record fee split: {e}");
                if let Err(fail_err) = self.fail(&claimed, error).await {
                    tracing::error!(
                        payment_request = %claimed.id,
                        error = %fail_err,
                        "Failed to mark payout as failed; request stays in processing"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            payment_request = %claimed.id,
            provider = self.provider.provider_id(),
            payout_amount_cents = split.payout_amount_cents,
            platform_fee_cents = split.platform_fee_cents,
            "Executing payout"
        );

        let subject = claimed.note_subject();
        let mut legs = Vec::with_capacity(2);

        let recipient = self
            .execute_leg(
                &claimed,
                LegKind::Recipient,
                destination,
                split.payout_amount_cents,
                format!("Payment for: {subject}"),
            )
            .await;
        legs.push(leg_outcome(LegKind::Recipient, split.payout_amount_cents, &recipient));

        let platform = if split.platform_fee_cents > 0 {
            let result = self
                .execute_leg(
                    &claimed,
                    LegKind::Platform,
                    &self.platform.host_payout_destination,
                    split.platform_fee_cents,
                    format!("Platform fee for: {subject}"),
                )
                .await;
            legs.push(leg_outcome(LegKind::Platform, split.platform_fee_cents, &result));
            Some(result)
        } else {
            None
        };

        let resolution = resolve(recipient, platform);
        let payment_request = self.reconciler.finish(claimed.id, &resolution).await?;
        match &resolution {
            PayoutResolution::Completed { .. } => tracing::info!(
                payment_request = %claimed.id,
                "Payout completed"
            ),
            PayoutResolution::Failed { error, .. } => tracing::error!(
                payment_request = %claimed.id,
                error = %error,
                "Payout failed"
            ),
        }

        Ok(SettlementOutcome {
            payment_request,
            legs,
        })
    }

    /// Record a failure for a claimed request without contacting the provider.
    pub async fn fail(
        &self,
        claimed: &PaymentRequest,
        error: String,
    ) -> Result<SettlementOutcome, SettlementError> {
        let resolution = PayoutResolution::Failed {
            error,
            payout_ref: None,
            platform_ref: None,
        };
        let payment_request = self.reconciler.finish(claimed.id, &resolution).await?;
        Ok(SettlementOutcome {
            payment_request,
            legs: Vec::new(),
        })
    }

    async fn execute_leg(
        &self,
        claimed: &PaymentRequest,
        leg: LegKind,
        destination: &str,
        amount_cents: Cents,
        note: String,
    ) -> Result<PayoutReceipt, PayoutError> {
        let instruction = PayoutInstruction {
            leg,
            destination: destination.to_string(),
            amount_cents,
            currency: self.platform.currency.clone(),
            note,
            idempotency_key: idempotency_key(&claimed.id.to_string(), leg.as_str()),
        };

        let result = match tokio::time::timeout(
            self.provider_timeout,
            self.provider.send_payout(&instruction),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PayoutError::Timeout(self.provider_timeout)),
        };

        match &result {
            Ok(receipt) => tracing::info!(
                payment_request = %claimed.id,
                leg = %leg,
                amount_cents,
                batch_ref = %receipt.batch_ref,
                replayed = receipt.replayed,
                "Payout leg accepted"
            ),
            Err(e) => tracing::warn!(
                payment_request = %claimed.id,
                leg = %leg,
                amount_cents,
                error = %e,
                "Payout leg failed"
            ),
        }
        result
    }
}

fn leg_outcome(
    leg: LegKind,
    amount_cents: Cents,
    result: &Result<PayoutReceipt, PayoutError>,
) -> LegOutcome {
    match result {
        Ok(receipt) => LegOutcome {
            leg,
            amount_cents,
            batch_ref: Some(receipt.batch_ref.clone()),
            error: None,
        },
        Err(e) => LegOutcome {
            leg,
            amount_cents,
            batch_ref: None,
            error: Some(e.to_string()),
        },
    }
}

/// Joint evaluation: completed only if the recipient leg and, when
/// attempted, the platform leg both succeeded.
fn resolve(
    recipient: Result<PayoutReceipt, PayoutError>,
    platform: Option<Result<PayoutReceipt, PayoutError>>,
) -> PayoutResolution {
    let mut errors = Vec::new();
    let payout_ref = match recipient {
        Ok(receipt) => Some(receipt.batch_ref),
        Err(e) => {
            errors.push(format!("{}: {e}", LegKind::Recipient.failure_label()));
            None
        }
    };
    let platform_ref = match platform {
        Some(Ok(receipt)) => Some(receipt.batch_ref),
        Some(Err(e)) => {
            errors.push(format!("{}: {e}", LegKind::Platform.failure_label()));
            None
        }
        None => None,
    };

    match (payout_ref, errors.is_empty()) {
        (Some(payout_ref), true) => PayoutResolution::Completed {
            payout_ref,
            platform_ref,
            completed_at: Utc::now(),
        },
        (payout_ref, _) => PayoutResolution::Failed {
            error: errors.join(" | "),
            payout_ref,
            platform_ref,
        },
    }
}
