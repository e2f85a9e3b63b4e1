//! Test harness wiring the settlement components over in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use splitpay_core::{Cents, PaymentRequest, PlatformConfig, RecipientId, RecipientPayoutProfile};
use splitpay_crypto::{signature_header, WebhookVerifier};
use splitpay_settlement::adapters::{InternalGateway, InternalPayoutProvider};
use splitpay_settlement::{
    InMemoryPaymentStore, IssueRequest, PaymentLinkIssuer, PaymentStore, PayoutOrchestrator,
    SettlementError, SettlementManager, StatusReconciler, WebhookIngestor, WebhookOutcome,
};

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const HOST_DESTINATION: &str = "host@splitpay.example";

/// Platform settings used unless a test overrides them: 20% fee, no bounds.
pub fn default_platform() -> PlatformConfig {
    PlatformConfig {
        host_payout_destination: HOST_DESTINATION.into(),
        ..PlatformConfig::default()
    }
}

pub struct Harness {
    pub store: Arc<InMemoryPaymentStore>,
    pub gateway: Arc<InternalGateway>,
    pub provider: Arc<InternalPayoutProvider>,
    pub reconciler: Arc<StatusReconciler>,
    pub settlement: Arc<SettlementManager>,
    pub issuer: PaymentLinkIssuer,
    pub ingestor: WebhookIngestor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(default_platform(), InternalPayoutProvider::new())
    }

    pub fn with(platform: PlatformConfig, provider: InternalPayoutProvider) -> Self {
        let platform = Arc::new(platform);
        let store = Arc::new(InMemoryPaymentStore::new());
        let gateway = Arc::new(InternalGateway::new("http://127.0.0.1:8080"));
        let provider = Arc::new(provider);
        let dyn_store: Arc<dyn PaymentStore> = store.clone();

        let reconciler = Arc::new(StatusReconciler::new(dyn_store.clone()));
        let orchestrator = Arc::new(
            PayoutOrchestrator::new(reconciler.clone(), provider.clone(), platform.clone())
                .with_provider_timeout(Duration::from_secs(5)),
        );
        let settlement = Arc::new(SettlementManager::new(
            dyn_store.clone(),
            reconciler.clone(),
            orchestrator,
        ));
        let issuer = PaymentLinkIssuer::new(
            dyn_store.clone(),
            gateway.clone(),
            reconciler.clone(),
            platform,
        );
        let verifier = WebhookVerifier::new(WEBHOOK_SECRET, 300).expect("non-empty secret");
        let ingestor = WebhookIngestor::new(verifier, dyn_store, settlement.clone());

        Self {
            store,
            gateway,
            provider,
            reconciler,
            settlement,
            issuer,
            ingestor,
        }
    }

    /// Save a payout destination for `recipient`.
    pub async fn onboard(&self, recipient: &str, destination: &str) {
        let profile = RecipientPayoutProfile::new(RecipientId::new(recipient))
            .with_destination(destination)
            .expect("valid destination");
        self.store.put_profile(profile).await.expect("profile saved");
    }

    /// Issue a pending payment request for an onboarded recipient.
    pub async fn issue(&self, recipient: &str, amount_cents: Cents) -> PaymentRequest {
        self.issuer
            .issue(IssueRequest {
                recipient_id: RecipientId::new(recipient),
                amount_cents,
                description: Some("Dinner".into()),
            })
            .await
            .expect("issue succeeds")
    }

    pub async fn current(&self, request: &PaymentRequest) -> PaymentRequest {
        self.store
            .get(request.id)
            .await
            .expect("store readable")
            .expect("request exists")
    }

    /// Sign `event` with the shared secret and hand it to the ingestor.
    pub async fn deliver(&self, event: &Value) -> Result<WebhookOutcome, SettlementError> {
        let payload = serde_json::to_vec(event).expect("serializable event");
        let header = signature_header(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), &payload);
        self.ingestor.ingest(&payload, Some(&header)).await
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn new_event_id() -> String {
    format!("evt_{}", uuid::Uuid::now_v7().simple())
}

pub fn completed_event(event_id: &str, checkout_ref: &str, payer: &str) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "session_id": format!("cs_{event_id}"),
            "checkout_ref": checkout_ref,
            "payer_identifier": payer,
        }
    })
}

pub fn deactivated_event(event_id: &str, checkout_ref: &str) -> Value {
    json!({
        "id": event_id,
        "type": "payment_link.updated",
        "data": { "checkout_ref": checkout_ref, "active": false }
    })
}
