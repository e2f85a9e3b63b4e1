//! Stripe Payment Links adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SettlementError;
use crate::traits::CheckoutGateway;
use crate::types::{CheckoutRequest, CheckoutSession};

pub const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

const DEFAULT_DESCRIPTION: &str = "P2P Payment via QR Code";

#[derive(Clone)]
pub struct StripeConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct PaymentLink {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    message: Option<String>,
}

/// Issues reusable hosted checkout links through the Stripe API.
pub struct StripeCheckoutGateway {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeCheckoutGateway {
    pub fn new(config: StripeConfig) -> Result<Self, SettlementError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SettlementError::Gateway(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        let description = request
            .description
            .clone()
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
        vec![
            (
                "line_items[0][price_data][currency]",
                request.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                description,
            ),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount_cents.to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[recipient_id]", request.recipient_id.to_string()),
        ]
    }
}

#[async_trait]
impl CheckoutGateway for StripeCheckoutGateway {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, SettlementError> {
        let url = format!(
            "{}/v1/payment_links",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .form(&Self::form(request))
            .send()
            .await
            .map_err(|e| SettlementError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| "no error message".to_string());
            return Err(SettlementError::Gateway(format!(
                "payment link creation returned HTTP {}: {message}",
                status.as_u16()
            )));
        }

        let link: PaymentLink = response
            .json()
            .await
            .map_err(|e| SettlementError::Gateway(format!("unreadable payment link: {e}")))?;
        Ok(CheckoutSession {
            checkout_ref: link.id,
            checkout_url: link.url,
        })
    }

    fn gateway_id(&self) -> &str {
        "gw-stripe"
    }
}
