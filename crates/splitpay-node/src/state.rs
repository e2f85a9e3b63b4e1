//! Shared node state for HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use splitpay_core::PlatformConfig;
use splitpay_crypto::WebhookVerifier;
use splitpay_settlement::{
    CheckoutGateway, PaymentLinkIssuer, PaymentStore, PayoutOrchestrator, PayoutProvider,
    SettlementManager, StatusReconciler, WebhookIngestor,
};

/// Everything a request handler needs, wired once at startup.
pub struct AppState {
    pub store: Arc<dyn PaymentStore>,
    pub issuer: PaymentLinkIssuer,
    pub ingestor: WebhookIngestor,
    pub settlement: Arc<SettlementManager>,
    pub gateway_id: String,
    pub provider_id: String,
    /// When the node started.
    pub start_time: Instant,
}

/// Timeouts applied to outbound calls.
#[derive(Debug, Clone, Copy)]
pub struct CallTimeouts {
    pub gateway: std::time::Duration,
    pub payout: std::time::Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn CheckoutGateway>,
        provider: Arc<dyn PayoutProvider>,
        platform: Arc<PlatformConfig>,
        verifier: WebhookVerifier,
        timeouts: CallTimeouts,
    ) -> Self {
        let gateway_id = gateway.gateway_id().to_string();
        let provider_id = provider.provider_id().to_string();

        let reconciler = Arc::new(StatusReconciler::new(store.clone()));
        let orchestrator = Arc::new(
            PayoutOrchestrator::new(reconciler.clone(), provider, platform.clone())
                .with_provider_timeout(timeouts.payout),
        );
        let settlement = Arc::new(SettlementManager::new(
            store.clone(),
            reconciler.clone(),
            orchestrator,
        ));
        let issuer = PaymentLinkIssuer::new(store.clone(), gateway, reconciler, platform)
            .with_gateway_timeout(timeouts.gateway);
        let ingestor = WebhookIngestor::new(verifier, store.clone(), settlement.clone());

        Self {
            store,
            issuer,
            ingestor,
            settlement,
            gateway_id,
            provider_id,
            start_time: Instant::now(),
        }
    }
}
