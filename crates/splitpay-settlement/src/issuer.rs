use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use splitpay_core::{
    Cents, CoreError, PaymentRequest, PaymentRequestId, PlatformConfig, RecipientId,
};

use crate::error::SettlementError;
use crate::reconciler::StatusReconciler;
use crate::traits::{CheckoutGateway, PaymentStore};
use crate::types::{CheckoutRequest, StatusChange};

/// Longest description accepted on a payment request.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// A recipient's request for a new payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub recipient_id: RecipientId,
    pub amount_cents: Cents,
    #[serde(default)]
    pub description: Option<String>,
}

/// Creates gateway checkout links and the pending requests behind them.
pub struct PaymentLinkIssuer {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn CheckoutGateway>,
    reconciler: Arc<StatusReconciler>,
    platform: Arc<PlatformConfig>,
    gateway_timeout: Duration,
}

impl PaymentLinkIssuer {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn CheckoutGateway>,
        reconciler: Arc<StatusReconciler>,
        platform: Arc<PlatformConfig>,
    ) -> Self {
        Self {
            store,
            gateway,
            reconciler,
            platform,
            gateway_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Issue a new payment link. Nothing is stored unless the gateway call
    /// succeeds.
    pub async fn issue(&self, request: IssueRequest) -> Result<PaymentRequest, SettlementError> {
        if request.amount_cents <= 0 {
            return Err(CoreError::InvalidAmount(format!(
                "amount must be positive, got {}",
                request.amount_cents
            ))
            .into());
        }
        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(d) = &description {
            if d.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(SettlementError::Validation(format!(
                    "description longer than {MAX_DESCRIPTION_LEN} characters"
                )));
            }
        }

        let profile = self
            .store
            .get_profile(&request.recipient_id)
            .await?
            .filter(|p| p.destination().is_some());
        let Some(profile) = profile else {
            return Err(SettlementError::MissingPayoutDestination(request.recipient_id));
        };
        let payee = profile
            .display_name
            .as_deref()
            .unwrap_or(request.recipient_id.as_str());

        let checkout = CheckoutRequest {
            recipient_id: request.recipient_id.clone(),
            amount_cents: request.amount_cents,
            currency: self.platform.currency.clone(),
            product_name: format!("Payment to {payee}"),
            description: description.clone(),
        };
        let session = tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.create_checkout(&checkout),
        )
        .await
        .map_err(|_| {
            SettlementError::Gateway(format!(
                "checkout creation timed out after {:?}",
                self.gateway_timeout
            ))
        })??;

        let record = PaymentRequest::new(
            request.recipient_id,
            request.amount_cents,
            description,
            session.checkout_ref,
            session.checkout_url,
        )?;
        self.store.insert(record.clone()).await?;

        tracing::info!(
            payment_request = %record.id,
            recipient = %record.recipient_id,
            amount_cents = record.amount_cents,
            gateway = self.gateway.gateway_id(),
            checkout_ref = %record.external_checkout_ref,
            "Payment link issued"
        );
        Ok(record)
    }

    /// Withdraw a pending link. Cancelling a request that is no longer
    /// pending returns [`StatusChange::Unchanged`].
    pub async fn cancel(
        &self,
        id: PaymentRequestId,
        recipient: &RecipientId,
    ) -> Result<StatusChange, SettlementError> {
        self.reconciler.cancel(id, recipient).await
    }
}
