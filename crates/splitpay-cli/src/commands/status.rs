//! `splitpay status`: Query the health of a running node.

use reqwest::Method;

use crate::client::{field, ApiClient};

pub async fn run(client: &ApiClient) -> anyhow::Result<()> {
    let health = client.send(client.request(Method::GET, "/health")).await?;

    println!("Node Status:");
    println!("  Endpoint: {}", client.endpoint());
    println!("  Status:   {}", field(&health, "status"));
    println!("  Version:  {}", field(&health, "version"));
    println!("  Uptime:   {}s", field(&health, "uptime_secs"));
    println!("  Gateway:  {}", field(&health, "gateway"));
    println!("  Payouts:  {}", field(&health, "payout_provider"));
    Ok(())
}
