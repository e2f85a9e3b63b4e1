//! The Splitpay node orchestrator.
//!
//! Builds the payment store, checkout gateway and payout provider selected by
//! the configuration, wires them into the settlement components, and serves
//! the HTTP API in a background task.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use splitpay_crypto::WebhookVerifier;
use splitpay_settlement::adapters::{
    InternalGateway, InternalPayoutProvider, PaypalConfig, PaypalPayoutProvider,
    StripeCheckoutGateway, StripeConfig,
};
use splitpay_settlement::{CheckoutGateway, InMemoryPaymentStore, PaymentStore, PayoutProvider};

use crate::config::{GatewayKind, PayoutKind, SplitpayConfig, StorageBackend};
use crate::state::{AppState, CallTimeouts};
use crate::storage::RocksStore;

/// The Splitpay node, owning the API server and its shared state.
pub struct SplitpayNode {
    /// Node configuration.
    config: SplitpayConfig,
    /// Shared state handed to HTTP handlers (set by `start`).
    state: Option<Arc<AppState>>,
    /// Background API server task.
    server: Option<JoinHandle<Result<()>>>,
    /// Signals the API server to stop accepting connections.
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl SplitpayNode {
    /// Create a node after validating its configuration.
    pub fn new(config: SplitpayConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            gateway = ?config.gateway.provider,
            payout = ?config.payout.provider,
            storage = ?config.storage.backend,
            "Splitpay node created"
        );
        Ok(Self {
            config,
            state: None,
            server: None,
            shutdown_tx: None,
        })
    }

    /// Open storage, build adapters and start the HTTP API.
    ///
    /// Returns the address the API is bound to.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        tracing::info!("starting Splitpay node");

        let store = self.open_store()?;
        let gateway = self.build_gateway()?;
        let provider = self.build_provider()?;
        let verifier = WebhookVerifier::new(
            &self.config.gateway.webhook_secret,
            self.config.gateway.webhook_tolerance_secs,
        )?;

        let state = Arc::new(AppState::new(
            store,
            gateway,
            provider,
            Arc::new(self.config.platform.clone()),
            verifier,
            CallTimeouts {
                gateway: self.config.gateway.timeout(),
                payout: self.config.payout.timeout(),
            },
        ));

        let listener = TcpListener::bind(self.config.api_addr())
            .await
            .with_context(|| format!("failed to bind {}", self.config.api_addr()))?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let api_state = state.clone();
        let server = tokio::spawn(async move {
            let result = crate::api::start_api_server(listener, api_state, shutdown_rx).await;
            if let Err(ref e) = result {
                tracing::error!(error = %e, "HTTP API server error");
            }
            result
        });

        self.state = Some(state);
        self.server = Some(server);
        self.shutdown_tx = Some(shutdown_tx);

        tracing::info!(%local_addr, "Splitpay node started");
        Ok(local_addr)
    }

    /// Wait until the API server exits.
    pub async fn run(&mut self) -> Result<()> {
        let Some(server) = self.server.as_mut() else {
            anyhow::bail!("node has not been started");
        };
        let result = server.await.context("API server task panicked")?;
        self.server = None;
        result
    }

    /// Stop the API server, letting in-flight requests finish.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down Splitpay node");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.await.context("API server task panicked")??;
        }
        self.state = None;
        tracing::info!("Splitpay node stopped");
        Ok(())
    }

    fn open_store(&self) -> Result<Arc<dyn PaymentStore>> {
        match self.config.storage.backend {
            StorageBackend::Rocksdb => {
                let path = &self.config.storage.data_dir;
                let store = RocksStore::open(path)?;
                tracing::info!(path = %path.display(), "storage initialized");
                Ok(Arc::new(store))
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage; state is lost on restart");
                Ok(Arc::new(InMemoryPaymentStore::new()))
            }
        }
    }

    fn build_gateway(&self) -> Result<Arc<dyn CheckoutGateway>> {
        let cfg = &self.config.gateway;
        Ok(match cfg.provider {
            GatewayKind::Internal => Arc::new(InternalGateway::new(&cfg.checkout_base_url)),
            GatewayKind::Stripe => Arc::new(StripeCheckoutGateway::new(StripeConfig {
                api_key: cfg.api_key.clone(),
                base_url: cfg.base_url.clone(),
                timeout: cfg.timeout(),
            })?),
        })
    }

    fn build_provider(&self) -> Result<Arc<dyn PayoutProvider>> {
        let cfg = &self.config.payout;
        Ok(match cfg.provider {
            PayoutKind::Internal => Arc::new(InternalPayoutProvider::new()),
            PayoutKind::Paypal => Arc::new(PaypalPayoutProvider::new(PaypalConfig {
                client_id: cfg.client_id.clone(),
                client_secret: cfg.client_secret.clone(),
                base_url: cfg.endpoint(),
                timeout: cfg.timeout(),
            })?),
        })
    }
}
