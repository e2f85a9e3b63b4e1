//! Integration test: fee configuration as seen through settled payouts.

use rust_decimal_macros::dec;
use splitpay_core::{PayoutStatus, PlatformConfig};
use splitpay_settlement::adapters::InternalPayoutProvider;
use splitpay_settlement::LegKind;
use splitpay_integration_tests::{completed_event, new_event_id, Harness, HOST_DESTINATION};

const ALICE: &str = "alice@example.com";

async fn settle(platform: PlatformConfig, amount_cents: i64) -> (Harness, splitpay_core::PaymentRequest) {
    let h = Harness::with(platform, InternalPayoutProvider::new());
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", amount_cents).await;
    h.deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();
    let settled = h.current(&req).await;
    (h, settled)
}

fn platform(fee_fraction: rust_decimal::Decimal, min: i64, max: i64) -> PlatformConfig {
    PlatformConfig {
        host_payout_destination: HOST_DESTINATION.into(),
        fee_fraction,
        min_fee_cents: min,
        max_fee_cents: max,
        currency: "USD".into(),
    }
}

#[tokio::test]
async fn test_one_cent_payment_skips_platform_leg() {
    let (h, settled) = settle(platform(dec!(0.20), 0, 0), 1).await;
    assert_eq!(settled.payout_status, PayoutStatus::Completed);
    assert_eq!(settled.platform_fee_cents, Some(0));
    assert_eq!(settled.payout_amount_cents, Some(1));
    assert!(settled.platform_payout_ref.is_none());
    assert!(h.provider.transfers_for(LegKind::Platform).is_empty());
    assert_eq!(h.provider.balance(ALICE), 1);
}

#[tokio::test]
async fn test_minimum_fee_applies() {
    let (h, settled) = settle(platform(dec!(0.05), 100, 0), 1000).await;
    assert_eq!(settled.platform_fee_cents, Some(100));
    assert_eq!(h.provider.balance(ALICE), 900);
    assert_eq!(h.provider.balance(HOST_DESTINATION), 100);
}

#[tokio::test]
async fn test_maximum_fee_applies() {
    let (h, settled) = settle(platform(dec!(0.20), 0, 500), 100_000).await;
    assert_eq!(settled.platform_fee_cents, Some(500));
    assert_eq!(h.provider.balance(ALICE), 99_500);
}

#[tokio::test]
async fn test_zero_fee_fraction_pays_everything_to_recipient() {
    let (h, settled) = settle(platform(dec!(0), 0, 0), 2500).await;
    assert_eq!(settled.payout_status, PayoutStatus::Completed);
    assert_eq!(settled.payout_amount_cents, Some(2500));
    assert_eq!(h.provider.transfer_count(), 1);
}

#[tokio::test]
async fn test_legs_always_sum_to_total() {
    for amount in [3, 99, 1001, 12_345] {
        let (h, settled) = settle(platform(dec!(0.175), 25, 2000), amount).await;
        let split = settled.fee_split().unwrap();
        assert_eq!(split.total(), amount);
        assert!(split.payout_amount_cents >= 1);
        assert_eq!(
            h.provider.balance(ALICE) + h.provider.balance(HOST_DESTINATION),
            amount
        );
    }
}
