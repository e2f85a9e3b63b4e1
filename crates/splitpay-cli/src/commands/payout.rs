//! `splitpay payout`: Trigger or retry the payout of a paid request.

use clap::Args;
use reqwest::Method;
use serde_json::json;

use crate::client::{field, ApiClient};

#[derive(Args, Debug)]
pub struct PayoutArgs {
    /// Payment request id.
    pub id: String,
}

pub async fn run(client: &ApiClient, args: &PayoutArgs) -> anyhow::Result<()> {
    let outcome = client
        .send(
            client
                .request(Method::POST, "/api/v1/payouts/trigger")
                .json(&json!({ "payment_request_id": args.id })),
        )
        .await?;

    println!("Payout attempt finished.");
    println!("  Status:    {}", field(&outcome, "payout_status"));
    println!("  Fee:       {} cents", field(&outcome, "platform_fee_cents"));
    println!("  Net:       {} cents", field(&outcome, "payout_amount_cents"));
    if let Some(legs) = outcome.get("legs").and_then(|l| l.as_array()) {
        for leg in legs {
            let result = match leg.get("error").and_then(|e| e.as_str()) {
                Some(err) => format!("failed: {err}"),
                None => format!("ok ({})", field(leg, "batch_ref")),
            };
            println!(
                "  Leg {:<9} {} cents, {}",
                field(leg, "leg"),
                field(leg, "amount_cents"),
                result
            );
        }
    }
    Ok(())
}
