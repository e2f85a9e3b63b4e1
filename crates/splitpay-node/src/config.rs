//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use splitpay_core::PlatformConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_WEBHOOK_SECRET: &str = "SPLITPAY_WEBHOOK_SECRET";
pub const ENV_GATEWAY_API_KEY: &str = "SPLITPAY_GATEWAY_API_KEY";
pub const ENV_PAYOUT_CLIENT_ID: &str = "SPLITPAY_PAYOUT_CLIENT_ID";
pub const ENV_PAYOUT_CLIENT_SECRET: &str = "SPLITPAY_PAYOUT_CLIENT_SECRET";
pub const ENV_HOST_PAYOUT_DESTINATION: &str = "SPLITPAY_HOST_PAYOUT_DESTINATION";

/// Full configuration for the Splitpay node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SplitpayConfig {
    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fee split and host payout destination.
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Checkout gateway and webhook settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Payout provider settings.
    #[serde(default)]
    pub payout: PayoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Rocksdb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    /// Links served by this node; payments are simulated with signed events.
    #[default]
    Internal,
    Stripe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub provider: GatewayKind,
    /// Gateway API key (Stripe secret key).
    #[serde(default)]
    pub api_key: String,
    /// Gateway API base URL.
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    /// Base URL of checkout links issued by the internal gateway.
    #[serde(default = "default_checkout_base_url")]
    pub checkout_base_url: String,
    /// Shared secret for webhook signatures.
    #[serde(default)]
    pub webhook_secret: String,
    /// Maximum accepted webhook age in seconds (0 disables the check).
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,
    /// Bound on a single gateway call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayoutKind {
    /// In-memory ledger, for local runs.
    #[default]
    Internal,
    Paypal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayoutMode {
    #[default]
    Sandbox,
    Live,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    #[serde(default)]
    pub provider: PayoutKind,
    #[serde(default)]
    pub mode: PayoutMode,
    /// Overrides the endpoint implied by `mode`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Bound on a single payout call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    8080
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_gateway_base_url() -> String {
    splitpay_settlement::adapters::stripe::DEFAULT_BASE_URL.into()
}
fn default_checkout_base_url() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_webhook_tolerance() -> i64 {
    splitpay_crypto::DEFAULT_TOLERANCE_SECS
}
fn default_timeout_secs() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: GatewayKind::default(),
            api_key: String::new(),
            base_url: default_gateway_base_url(),
            checkout_base_url: default_checkout_base_url(),
            webhook_secret: String::new(),
            webhook_tolerance_secs: default_webhook_tolerance(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            provider: PayoutKind::default(),
            mode: PayoutMode::default(),
            base_url: None,
            client_id: String::new(),
            client_secret: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PayoutConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint(&self) -> String {
        use splitpay_settlement::adapters::paypal::{LIVE_BASE_URL, SANDBOX_BASE_URL};
        match (&self.base_url, self.mode) {
            (Some(url), _) => url.clone(),
            (None, PayoutMode::Sandbox) => SANDBOX_BASE_URL.into(),
            (None, PayoutMode::Live) => LIVE_BASE_URL.into(),
        }
    }
}

impl SplitpayConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: SplitpayConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Overlay secrets from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(v) = lookup(ENV_WEBHOOK_SECRET) {
            self.gateway.webhook_secret = v;
        }
        if let Some(v) = lookup(ENV_GATEWAY_API_KEY) {
            self.gateway.api_key = v;
        }
        if let Some(v) = lookup(ENV_PAYOUT_CLIENT_ID) {
            self.payout.client_id = v;
        }
        if let Some(v) = lookup(ENV_PAYOUT_CLIENT_SECRET) {
            self.payout.client_secret = v;
        }
        if let Some(v) = lookup(ENV_HOST_PAYOUT_DESTINATION) {
            self.platform.host_payout_destination = v;
        }
    }

    /// Check everything the node needs before it starts serving.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut problems = Vec::new();
        if let Err(e) = self.platform.validate() {
            problems.push(e.to_string());
        }
        if self.gateway.webhook_secret.is_empty() {
            problems.push(format!(
                "gateway.webhook_secret is empty (set it or {ENV_WEBHOOK_SECRET})"
            ));
        }
        if self.gateway.provider == GatewayKind::Stripe && self.gateway.api_key.is_empty() {
            problems.push(format!(
                "gateway.api_key is required for the stripe gateway (or {ENV_GATEWAY_API_KEY})"
            ));
        }
        if self.payout.provider == PayoutKind::Paypal
            && (self.payout.client_id.is_empty() || self.payout.client_secret.is_empty())
        {
            problems.push(format!(
                "payout.client_id and payout.client_secret are required for paypal \
                 (or {ENV_PAYOUT_CLIENT_ID} / {ENV_PAYOUT_CLIENT_SECRET})"
            ));
        }
        if self.gateway.timeout_secs == 0 || self.payout.timeout_secs == 0 {
            problems.push("timeouts must be at least one second".into());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("invalid configuration: {}", problems.join("; "))
        }
    }

    /// API listen address as `host:port`.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }
}
