//! `splitpay request | show | cancel`: Payment request lifecycle.

use clap::Args;
use reqwest::Method;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::client::{field, ApiClient, RECIPIENT_HEADER};

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Recipient issuing the request.
    #[arg(short, long)]
    pub recipient: String,

    /// Amount in major units (e.g. 10.50).
    #[arg(short, long)]
    pub amount: Decimal,

    /// Optional note shown to the payer.
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Payment request id.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Payment request id.
    pub id: String,

    /// Recipient that owns the request.
    #[arg(short, long)]
    pub recipient: String,
}

/// Convert a major-unit amount to whole cents.
pub fn to_cents(amount: Decimal) -> anyhow::Result<i64> {
    let cents = amount * Decimal::ONE_HUNDRED;
    if !cents.fract().is_zero() {
        anyhow::bail!("amount {amount} has more than two decimal places");
    }
    cents
        .to_i64()
        .ok_or_else(|| anyhow::anyhow!("amount {amount} is out of range"))
}

pub fn print_request(req: &Value) {
    println!("  ID:        {}", field(req, "id"));
    println!("  Recipient: {}", field(req, "recipient_id"));
    println!("  Amount:    {} cents", field(req, "amount_cents"));
    println!("  Status:    {}", field(req, "status"));
    println!("  Payout:    {}", field(req, "payout_status"));
    println!("  Link:      {}", field(req, "checkout_url"));
    if req.get("platform_fee_cents").is_some_and(|v| !v.is_null()) {
        println!("  Fee:       {} cents", field(req, "platform_fee_cents"));
        println!("  Net:       {} cents", field(req, "payout_amount_cents"));
    }
    if req.get("payout_error").is_some_and(|v| !v.is_null()) {
        println!("  Error:     {}", field(req, "payout_error"));
    }
}

pub async fn create(client: &ApiClient, args: &RequestArgs) -> anyhow::Result<()> {
    let amount_cents = to_cents(args.amount)?;
    let body = json!({
        "amount_cents": amount_cents,
        "description": args.description,
    });
    let req = client
        .send(
            client
                .request(Method::POST, "/api/v1/payment-requests")
                .header(RECIPIENT_HEADER, &args.recipient)
                .json(&body),
        )
        .await?;

    println!("Payment link issued!");
    print_request(&req);
    Ok(())
}

pub async fn show(client: &ApiClient, args: &ShowArgs) -> anyhow::Result<()> {
    let req = client
        .send(client.request(Method::GET, &format!("/api/v1/payment-requests/{}", args.id)))
        .await?;
    println!("Payment Request:");
    print_request(&req);
    Ok(())
}

pub async fn cancel(client: &ApiClient, args: &CancelArgs) -> anyhow::Result<()> {
    let req = client
        .send(
            client
                .request(
                    Method::POST,
                    &format!("/api/v1/payment-requests/{}/cancel", args.id),
                )
                .header(RECIPIENT_HEADER, &args.recipient),
        )
        .await?;
    println!("Payment request cancelled.");
    print_request(&req);
    Ok(())
}
