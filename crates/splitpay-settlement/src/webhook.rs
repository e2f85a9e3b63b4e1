//! Gateway webhook ingestion.
//!
//! Every payload is authenticated before it is parsed. Events are
//! idempotent at two levels: a recorded event id is acknowledged without
//! work, and each status change is conditional, so a replayed or reordered
//! event that slips past the id check is still a no-op.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use splitpay_core::{PaidDetails, PaymentRequest, PaymentRequestId, PaymentStatus, PayoutStatus};
use splitpay_crypto::{CryptoError, WebhookVerifier};

use crate::error::SettlementError;
use crate::manager::SettlementManager;
use crate::traits::PaymentStore;
use crate::types::{PayoutAttempt, StatusChange};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const LINK_UPDATED: &str = "payment_link.updated";

/// Envelope shared by every gateway notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Payload of `checkout.session.completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutCompleted {
    pub session_id: String,
    #[serde(default)]
    pub checkout_ref: Option<String>,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub payer_identifier: Option<String>,
}

/// Payload of `payment_link.updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkUpdated {
    #[serde(default)]
    pub checkout_ref: Option<String>,
    #[serde(default)]
    pub checkout_url: Option<String>,
    pub active: bool,
}

/// What the ingestor did with an authenticated event. Every variant is
/// acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// `pending → paid` applied and payout handed off.
    Paid {
        payment_request_id: PaymentRequestId,
        payout_status: PayoutStatus,
    },
    /// `pending → expired` applied.
    Expired { payment_request_id: PaymentRequestId },
    /// The request was already past the state this event moves it out of.
    NoOp {
        payment_request_id: PaymentRequestId,
        status: PaymentStatus,
    },
    /// This event id was processed before.
    Duplicate,
    /// No payment request matches the event.
    Unmatched,
    /// Event type or content this engine does not act on.
    Ignored { event_type: String },
}

pub struct WebhookIngestor {
    verifier: WebhookVerifier,
    store: Arc<dyn PaymentStore>,
    settlement: Arc<SettlementManager>,
}

impl WebhookIngestor {
    pub fn new(
        verifier: WebhookVerifier,
        store: Arc<dyn PaymentStore>,
        settlement: Arc<SettlementManager>,
    ) -> Self {
        Self {
            verifier,
            store,
            settlement,
        }
    }

    /// Authenticate and apply one raw notification.
    ///
    /// Errors mean the payload was rejected (bad signature, unparseable
    /// body) or the state change could not be recorded; payout failures
    /// after a recorded `paid` transition are never surfaced here.
    pub async fn ingest(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, SettlementError> {
        let verified = match signature {
            Some(header) => self.verifier.verify(payload, header),
            None => Err(CryptoError::MalformedHeader("missing signature header".into())),
        };
        if let Err(e) = verified {
            tracing::warn!(
                target: "splitpay::security",
                error = %e,
                payload_len = payload.len(),
                "Rejected webhook with invalid signature"
            );
            return Err(e.into());
        }

        let event: GatewayEvent = serde_json::from_slice(payload)?;
        if let Some(event_id) = &event.id {
            if self.store.is_event_recorded(event_id).await? {
                tracing::info!(event_id = %event_id, event_type = %event.event_type, "Duplicate webhook event acknowledged");
                return Ok(WebhookOutcome::Duplicate);
            }
        }
        tracing::debug!(event_id = ?event.id, event_type = %event.event_type, "Webhook event received");

        let outcome = match event.event_type.as_str() {
            CHECKOUT_COMPLETED => {
                let data: CheckoutCompleted = serde_json::from_value(event.data.clone())?;
                self.on_checkout_completed(data).await?
            }
            LINK_UPDATED => {
                let data: LinkUpdated = serde_json::from_value(event.data.clone())?;
                self.on_link_updated(data).await?
            }
            other => {
                tracing::debug!(event_type = %other, "Ignoring unhandled webhook event type");
                WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                }
            }
        };

        if let Some(event_id) = &event.id {
            self.store.record_event(event_id).await?;
        }
        Ok(outcome)
    }

    async fn on_checkout_completed(
        &self,
        data: CheckoutCompleted,
    ) -> Result<WebhookOutcome, SettlementError> {
        let Some(request) = self
            .resolve(data.checkout_ref.as_deref(), data.checkout_url.as_deref())
            .await?
        else {
            tracing::warn!(
                checkout_ref = ?data.checkout_ref,
                checkout_url = ?data.checkout_url,
                session_id = %data.session_id,
                "Checkout completed for unknown payment link"
            );
            return Ok(WebhookOutcome::Unmatched);
        };

        let details = PaidDetails {
            session_id: data.session_id,
            payer_identifier: data.payer_identifier,
            paid_at: Utc::now(),
        };
        let paid = match self.settlement.reconciler().mark_paid(request.id, &details).await? {
            StatusChange::Applied(paid) => paid,
            StatusChange::Unchanged(current) => {
                return Ok(WebhookOutcome::NoOp {
                    payment_request_id: current.id,
                    status: current.status,
                });
            }
        };

        // `paid` is durable at this point; payout trouble is recorded on the
        // request, not reported to the gateway.
        let payout_status = match self.settlement.trigger_payout(paid.id).await {
            Ok(PayoutAttempt::Finished(outcome)) => outcome.payment_request.payout_status,
            Ok(PayoutAttempt::AlreadyInProgress) => PayoutStatus::Processing,
            Ok(PayoutAttempt::NotEligible(reason)) => {
                tracing::warn!(payment_request = %paid.id, reason = %reason, "Freshly paid request was not eligible for payout");
                paid.payout_status
            }
            Err(e) => {
                tracing::error!(payment_request = %paid.id, error = %e, "Payout hand-off failed");
                paid.payout_status
            }
        };

        Ok(WebhookOutcome::Paid {
            payment_request_id: paid.id,
            payout_status,
        })
    }

    async fn on_link_updated(&self, data: LinkUpdated) -> Result<WebhookOutcome, SettlementError> {
        if data.active {
            return Ok(WebhookOutcome::Ignored {
                event_type: LINK_UPDATED.to_string(),
            });
        }

        let Some(request) = self
            .resolve(data.checkout_ref.as_deref(), data.checkout_url.as_deref())
            .await?
        else {
            tracing::warn!(checkout_ref = ?data.checkout_ref, "Link deactivated for unknown payment link");
            return Ok(WebhookOutcome::Unmatched);
        };

        Ok(match self.settlement.reconciler().expire(request.id).await? {
            StatusChange::Applied(expired) => WebhookOutcome::Expired {
                payment_request_id: expired.id,
            },
            StatusChange::Unchanged(current) => WebhookOutcome::NoOp {
                payment_request_id: current.id,
                status: current.status,
            },
        })
    }

    /// Look up by checkout reference, falling back to the checkout URL.
    async fn resolve(
        &self,
        checkout_ref: Option<&str>,
        checkout_url: Option<&str>,
    ) -> Result<Option<PaymentRequest>, SettlementError> {
        if let Some(checkout_ref) = checkout_ref.filter(|r| !r.is_empty()) {
            if let Some(found) = self.store.find_by_checkout_ref(checkout_ref).await? {
                return Ok(Some(found));
            }
        }
        match checkout_url.filter(|u| !u.is_empty()) {
            Some(url) => self.store.find_by_checkout_url(url).await,
            None => Ok(None),
        }
    }
}
