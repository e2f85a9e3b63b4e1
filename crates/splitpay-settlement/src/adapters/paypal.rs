//! PayPal Payouts adapter.
//!
//! Each leg is sent as a single-item payout batch. The leg's idempotency key
//! is used both as `sender_batch_id` and as the `PayPal-Request-Id` header,
//! so a retried leg is either answered with the original batch or refused as
//! an already-used batch id, which is treated as success.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::PayoutError;
use crate::traits::{validate_instruction, PayoutProvider};
use crate::types::{PayoutInstruction, PayoutReceipt};

pub const SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";
pub const LIVE_BASE_URL: &str = "https://api-m.paypal.com";

const EMAIL_SUBJECT: &str = "You have a payment!";
const DUPLICATE_BATCH_ISSUE: &str = "SENDER_BATCH_ID_ALREADY_USED";

/// Credentials and endpoint for the PayPal REST API.
#[derive(Clone)]
pub struct PaypalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for PaypalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaypalConfig")
            .field("client_id", &self.client_id)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BatchHeader {
    payout_batch_id: String,
}

#[derive(Debug, Deserialize)]
struct BatchItem {
    payout_item_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    batch_header: BatchHeader,
    #[serde(default)]
    items: Vec<BatchItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    issue: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    debug_id: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

impl ErrorResponse {
    fn is_duplicate_batch(&self) -> bool {
        self.name.as_deref() == Some(DUPLICATE_BATCH_ISSUE)
            || self
                .details
                .iter()
                .any(|d| d.issue.as_deref() == Some(DUPLICATE_BATCH_ISSUE))
    }

    fn describe(&self) -> String {
        let mut message = self
            .message
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        let issues: Vec<&str> = self
            .details
            .iter()
            .filter_map(|d| d.issue.as_deref())
            .collect();
        if !issues.is_empty() {
            message.push_str(&format!(" | Details: {}", issues.join(", ")));
        }
        if let Some(debug_id) = &self.debug_id {
            message.push_str(&format!(" | Debug ID: {debug_id}"));
        }
        message
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Live payout rail backed by the PayPal Payouts API.
pub struct PaypalPayoutProvider {
    http: reqwest::Client,
    config: PaypalConfig,
    token: Mutex<Option<CachedToken>>,
}

impl PaypalPayoutProvider {
    pub fn new(config: PaypalConfig) -> Result<Self, PayoutError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String, PayoutError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header("Accept", "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PayoutError::Auth(format!(
                "token request returned HTTP {}",
                response.status().as_u16()
            )));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PayoutError::Auth(format!("unreadable token response: {e}")))?;

        // Refresh a minute early so a token never expires mid-request.
        let lifetime = body.expires_in.unwrap_or(300).saturating_sub(60);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(body.access_token)
    }
}

/// `1234` cents → `"12.34"`.
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[async_trait]
impl PayoutProvider for PaypalPayoutProvider {
    async fn send_payout(
        &self,
        instruction: &PayoutInstruction,
    ) -> Result<PayoutReceipt, PayoutError> {
        validate_instruction(instruction)?;
        let token = self.access_token().await?;

        let body = json!({
            "sender_batch_header": {
                "sender_batch_id": instruction.idempotency_key,
                "email_subject": EMAIL_SUBJECT,
                "email_message": instruction.note,
            },
            "items": [{
                "recipient_type": "EMAIL",
                "amount": {
                    "value": format_amount(instruction.amount_cents),
                    "currency": instruction.currency,
                },
                "receiver": instruction.destination,
                "note": instruction.note,
                "sender_item_id": format!("{}-item", instruction.idempotency_key),
            }],
        });

        let response = self
            .http
            .post(self.url("/v1/payments/payouts"))
            .bearer_auth(token)
            .header("PayPal-Request-Id", &instruction.idempotency_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status().as_u16();

        if status == 200 || status == 201 {
            let batch: BatchResponse = response.json().await.map_err(|e| {
                PayoutError::Transport(format!("unreadable payout response: {e}"))
            })?;
            return Ok(PayoutReceipt {
                batch_ref: batch.batch_header.payout_batch_id,
                item_ref: batch.items.into_iter().find_map(|i| i.payout_item_id),
                replayed: false,
            });
        }

        let error: ErrorResponse = response.json().await.unwrap_or_default();
        if error.is_duplicate_batch() {
            tracing::info!(
                idempotency_key = %instruction.idempotency_key,
                "PayPal reports batch already sent, treating leg as paid"
            );
            return Ok(PayoutReceipt {
                batch_ref: instruction.idempotency_key.clone(),
                item_ref: None,
                replayed: true,
            });
        }
        Err(PayoutError::Rejected {
            status,
            message: error.describe(),
        })
    }

    fn provider_id(&self) -> &str {
        "pp-paypal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LegKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, timeout: Duration) -> PaypalPayoutProvider {
        PaypalPayoutProvider::new(PaypalConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            base_url: server.uri(),
            timeout,
        })
        .unwrap()
    }

    fn instruction() -> PayoutInstruction {
        PayoutInstruction {
            leg: LegKind::Recipient,
            destination: "alice@example.com".into(),
            amount_cents: 1234,
            currency: "USD".into(),
            note: "Payment for: Lunch".into(),
            idempotency_key: "sp-recipient-0123456789abcdef".into(),
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A21AA-token",
                "token_type": "Bearer",
                "expires_in": 32400
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1234), "12.34");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(100), "1.00");
    }

    #[tokio::test]
    async fn test_successful_payout() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/payouts"))
            .and(header("PayPal-Request-Id", "sp-recipient-0123456789abcdef"))
            .and(header("Authorization", "Bearer A21AA-token"))
            .and(body_partial_json(json!({
                "sender_batch_header": { "sender_batch_id": "sp-recipient-0123456789abcdef" },
                "items": [{ "amount": { "value": "12.34", "currency": "USD" }, "receiver": "alice@example.com" }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "batch_header": { "payout_batch_id": "5UXD2E8A7EBQJ", "batch_status": "PENDING" }
            })))
            .mount(&server)
            .await;

        let receipt = provider(&server, Duration::from_secs(5))
            .send_payout(&instruction())
            .await
            .unwrap();
        assert_eq!(receipt.batch_ref, "5UXD2E8A7EBQJ");
        assert!(!receipt.replayed);
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/payouts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "batch_header": { "payout_batch_id": "B1" }
            })))
            .mount(&server)
            .await;

        let p = provider(&server, Duration::from_secs(5));
        p.send_payout(&instruction()).await.unwrap();
        p.send_payout(&instruction()).await.unwrap();
        // `expect(1)` on the token mock is verified when the server drops.
    }

    #[tokio::test]
    async fn test_rejection_carries_details() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/payouts"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "message": "The requested action could not be performed",
                "debug_id": "abc123",
                "details": [{ "issue": "RECEIVER_UNREGISTERED" }]
            })))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .send_payout(&instruction())
            .await
            .unwrap_err();
        match err {
            PayoutError::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert!(message.contains("RECEIVER_UNREGISTERED"));
                assert!(message.contains("Debug ID: abc123"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_batch_is_replay() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/payouts"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "name": "USER_BUSINESS_ERROR",
                "message": "User business error.",
                "details": [{ "issue": "SENDER_BATCH_ID_ALREADY_USED" }]
            })))
            .mount(&server)
            .await;

        let receipt = provider(&server, Duration::from_secs(5))
            .send_payout(&instruction())
            .await
            .unwrap();
        assert!(receipt.replayed);
        assert_eq!(receipt.batch_ref, "sp-recipient-0123456789abcdef");
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .send_payout(&instruction())
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::Auth(_)));
    }

    #[tokio::test]
    async fn test_invalid_instruction_never_calls_api() {
        let server = MockServer::start().await;
        let mut bad = instruction();
        bad.amount_cents = 0;
        let err = provider(&server, Duration::from_secs(5))
            .send_payout(&bad)
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::InvalidInstruction(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_slow_api_is_transport_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/payouts"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_millis(200))
            .send_payout(&instruction())
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::Transport(_)));
    }
}
