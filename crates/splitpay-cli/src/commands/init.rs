//! `splitpay init`: Write a starter node configuration.

use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory).
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Email that receives the platform fee leg.
    #[arg(long, default_value = "")]
    pub host_payout_destination: String,
}

/// A random secret in the form the node expects for webhook signing.
pub fn generate_webhook_secret() -> String {
    let bytes: [u8; 24] = rand::random();
    format!("whsec_{}", hex::encode(bytes))
}

pub fn render_config(webhook_secret: &str, host_payout_destination: &str) -> String {
    format!(
        r#"# Splitpay Node Configuration

[api]
listen_addr = "127.0.0.1"
port = 8080

[storage]
backend = "rocksdb"
data_dir = "./data"

[logging]
level = "info"
format = "text"

[platform]
host_payout_destination = "{host_payout_destination}"
fee_fraction = "0.20"
min_fee_cents = 0
max_fee_cents = 0
currency = "USD"

[gateway]
provider = "internal"
checkout_base_url = "http://127.0.0.1:8080"
webhook_secret = "{webhook_secret}"
webhook_tolerance_secs = 300
timeout_secs = 15

[payout]
provider = "internal"
mode = "sandbox"
timeout_secs = 15
"#
    )
}

fn write_config(dir: &Path, host_payout_destination: &str) -> anyhow::Result<(PathBuf, String)> {
    let config_path = dir.join("splitpay.toml");
    if config_path.exists() {
        anyhow::bail!("configuration file already exists at {}", config_path.display());
    }

    std::fs::create_dir_all(dir)?;
    let secret = generate_webhook_secret();
    std::fs::write(&config_path, render_config(&secret, host_payout_destination))?;
    std::fs::create_dir_all(dir.join("data"))?;
    Ok((config_path, secret))
}

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    let (config_path, secret) = write_config(&args.dir, &args.host_payout_destination)?;

    println!("Initialized Splitpay node at {}", config_path.display());
    println!("  Webhook secret: {secret}");
    if args.host_payout_destination.is_empty() {
        println!();
        println!("Set platform.host_payout_destination before starting the node.");
    }
    println!("Run 'splitpay-node --config {}' to start the node.", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_shape() {
        let a = generate_webhook_secret();
        assert!(a.starts_with("whsec_"));
        assert_eq!(a.len(), "whsec_".len() + 48);
        assert_ne!(a, generate_webhook_secret());
    }

    #[test]
    fn test_rendered_config_is_valid_toml() {
        let rendered = render_config("whsec_abc", "host@splitpay.example");
        let parsed: toml::Table = rendered.parse().unwrap();
        assert!(parsed.contains_key("gateway"));
    }

    #[test]
    fn test_write_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("splitpay-init-{}", uuid::Uuid::now_v7()));
        let (path, _) = write_config(&dir, "").unwrap();
        assert!(path.exists());
        assert!(dir.join("data").is_dir());
        assert!(write_config(&dir, "").is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
