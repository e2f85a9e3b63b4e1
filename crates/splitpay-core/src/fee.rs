//! Platform fee split. Pure arithmetic over [`PlatformConfig`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::PlatformConfig;
use crate::error::CoreError;
use crate::types::Cents;

/// How a collected amount is divided between the platform and the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub platform_fee_cents: Cents,
    pub payout_amount_cents: Cents,
}

impl FeeSplit {
    pub fn total(&self) -> Cents {
        self.platform_fee_cents + self.payout_amount_cents
    }
}

/// Split `total_amount_cents` into platform fee and recipient payout.
///
/// The fee is `round(total * fee_fraction)` (half away from zero), clamped to
/// the configured minimum and, when non-zero, maximum. A fee that would take
/// the whole amount is cut to `total - 1` so the recipient leg is never empty.
pub fn calculate_fee_split(
    total_amount_cents: Cents,
    config: &PlatformConfig,
) -> Result<FeeSplit, CoreError> {
    if total_amount_cents <= 0 {
        return Err(CoreError::InvalidAmount(format!(
            "total amount must be positive, got {total_amount_cents}"
        )));
    }

    let raw = (Decimal::from(total_amount_cents) * config.fee_fraction)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let mut fee = raw.to_i64().ok_or_else(|| {
        CoreError::InvalidAmount(format!("fee out of range for {total_amount_cents}"))
    })?;
    fee = fee.max(0);

    if config.min_fee_cents > 0 && fee < config.min_fee_cents {
        fee = config.min_fee_cents;
    }
    if config.max_fee_cents > 0 && fee > config.max_fee_cents {
        fee = config.max_fee_cents;
    }
    if fee >= total_amount_cents {
        fee = total_amount_cents - 1;
    }

    Ok(FeeSplit {
        platform_fee_cents: fee,
        payout_amount_cents: total_amount_cents - fee,
    })
}
