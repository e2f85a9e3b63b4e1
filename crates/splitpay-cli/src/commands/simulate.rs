//! `splitpay simulate`: Send a signed gateway event to the node.
//!
//! Stands in for the hosted gateway when the node runs the internal gateway.

use clap::{Args, ValueEnum};
use reqwest::Method;
use serde_json::{json, Value};

use splitpay_crypto::{signature_header, SIGNATURE_HEADER};

use crate::client::{field, ApiClient};

const ENV_WEBHOOK_SECRET: &str = "SPLITPAY_WEBHOOK_SECRET";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventKind {
    /// The payer finished checkout.
    Completed,
    /// The checkout link was deactivated.
    Expired,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Checkout reference of the payment link (e.g. plink_...).
    pub checkout_ref: String,

    #[arg(short, long, value_enum, default_value_t = EventKind::Completed)]
    pub kind: EventKind,

    /// Payer email recorded on completion.
    #[arg(short, long)]
    pub payer: Option<String>,

    /// Webhook secret; falls back to SPLITPAY_WEBHOOK_SECRET.
    #[arg(short, long)]
    pub secret: Option<String>,
}

pub fn build_event(kind: EventKind, checkout_ref: &str, payer: Option<&str>) -> Value {
    let event_id = format!("evt_{}", uuid::Uuid::now_v7().simple());
    match kind {
        EventKind::Completed => json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "data": {
                "session_id": format!("cs_{}", uuid::Uuid::now_v7().simple()),
                "checkout_ref": checkout_ref,
                "payer_identifier": payer,
            }
        }),
        EventKind::Expired => json!({
            "id": event_id,
            "type": "payment_link.updated",
            "data": { "checkout_ref": checkout_ref, "active": false }
        }),
    }
}

pub async fn run(client: &ApiClient, args: &SimulateArgs) -> anyhow::Result<()> {
    let secret = match &args.secret {
        Some(s) => s.clone(),
        None => std::env::var(ENV_WEBHOOK_SECRET)
            .map_err(|_| anyhow::anyhow!("pass --secret or set {ENV_WEBHOOK_SECRET}"))?,
    };

    let event = build_event(args.kind, &args.checkout_ref, args.payer.as_deref());
    let payload = serde_json::to_vec(&event)?;
    let header = signature_header(&secret, chrono::Utc::now().timestamp(), &payload);

    let ack = client
        .send(
            client
                .request(Method::POST, "/api/v1/webhooks/gateway")
                .header(SIGNATURE_HEADER, header)
                .header("content-type", "application/json")
                .body(payload),
        )
        .await?;

    let outcome = ack.get("outcome").cloned().unwrap_or(Value::Null);
    println!("Event delivered: {}", field(&event, "id"));
    println!("  Result:  {}", field(&outcome, "result"));
    println!("  Request: {}", field(&outcome, "payment_request_id"));
    if outcome.get("payout_status").is_some() {
        println!("  Payout:  {}", field(&outcome, "payout_status"));
    }
    Ok(())
}
