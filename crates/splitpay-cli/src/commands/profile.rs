//! `splitpay profile`: Show or set a recipient's payout destination.

use clap::Args;
use reqwest::Method;
use serde_json::json;

use crate::client::{field, ApiClient, RECIPIENT_HEADER};

#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// Recipient id.
    pub recipient: String,

    /// New payout email; omit to show the current profile.
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Name shown to payers on checkout.
    #[arg(short, long)]
    pub name: Option<String>,
}

pub async fn run(client: &ApiClient, args: &ProfileArgs) -> anyhow::Result<()> {
    let path = format!("/api/v1/recipients/{}/payout-profile", args.recipient);
    let profile = match &args.destination {
        Some(destination) => {
            let body = json!({ "payout_destination": destination, "display_name": args.name });
            let profile = client
                .send(
                    client
                        .request(Method::PUT, &path)
                        .header(RECIPIENT_HEADER, &args.recipient)
                        .json(&body),
                )
                .await?;
            println!("Payout destination saved.");
            profile
        }
        None => {
            client
                .send(
                    client
                        .request(Method::GET, &path)
                        .header(RECIPIENT_HEADER, &args.recipient),
                )
                .await?
        }
    };

    println!("  Recipient:   {}", field(&profile, "recipient_id"));
    println!("  Destination: {}", field(&profile, "payout_destination"));
    println!("  Name:        {}", field(&profile, "display_name"));
    Ok(())
}
