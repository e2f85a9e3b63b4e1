use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{is_valid_payout_email, Cents};

/// Process-wide platform settings, loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Destination that receives the platform fee leg.
    pub host_payout_destination: String,
    /// Share of each payment kept as the platform fee, in `[0, 1]`.
    pub fee_fraction: Decimal,
    /// Lower bound on the fee (0 disables).
    pub min_fee_cents: Cents,
    /// Upper bound on the fee (0 disables).
    pub max_fee_cents: Cents,
    /// ISO 4217 code used for checkout and payouts.
    pub currency: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            host_payout_destination: "platform@example.com".into(),
            fee_fraction: Decimal::new(20, 2),
            min_fee_cents: 0,
            max_fee_cents: 0,
            currency: "USD".into(),
        }
    }
}

impl PlatformConfig {
    /// Check every constraint and report all violations at once.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut errors = Vec::new();

        if !is_valid_payout_email(&self.host_payout_destination) {
            errors.push("invalid host payout destination format".to_string());
        }
        if self.fee_fraction < Decimal::ZERO || self.fee_fraction > Decimal::ONE {
            errors.push("fee fraction must be between 0 and 1".to_string());
        }
        if self.min_fee_cents < 0 {
            errors.push("minimum fee cannot be negative".to_string());
        }
        if self.max_fee_cents < 0 {
            errors.push("maximum fee cannot be negative".to_string());
        }
        if self.max_fee_cents > 0 && self.min_fee_cents > self.max_fee_cents {
            errors.push("minimum fee cannot be greater than maximum fee".to_string());
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            errors.push(format!("invalid currency code: {}", self.currency));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidConfig(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = PlatformConfig::default();
        assert_eq!(config.fee_fraction, dec!(0.20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = PlatformConfig {
            host_payout_destination: "not-an-email".into(),
            fee_fraction: dec!(1.5),
            min_fee_cents: 500,
            max_fee_cents: 100,
            currency: "usd".into(),
        };
        match config.validate() {
            Err(CoreError::InvalidConfig(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_bounds_rejected() {
        let config = PlatformConfig {
            min_fee_cents: -1,
            max_fee_cents: -1,
            ..PlatformConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial() {
        let config: PlatformConfig = toml::from_str(
            r#"
host_payout_destination = "fees@example.com"
fee_fraction = "0.10"
"#,
        )
        .expect("parse");
        assert_eq!(config.fee_fraction, dec!(0.10));
        assert_eq!(config.currency, "USD");
        assert_eq!(config.max_fee_cents, 0);
    }
}
