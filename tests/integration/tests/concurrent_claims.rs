//! Integration test: racing webhook deliveries and payout triggers.
//!
//! Whatever the interleaving, each leg of a payment request is transferred
//! exactly once.

use std::time::Duration;

use futures::future::join_all;
use splitpay_core::{PaymentStatus, PayoutStatus};
use splitpay_settlement::adapters::InternalPayoutProvider;
use splitpay_settlement::{PayoutAttempt, WebhookOutcome};
use splitpay_integration_tests::{
    completed_event, default_platform, new_event_id, Harness, HOST_DESTINATION,
};

const ALICE: &str = "alice@example.com";

fn slow_harness() -> Harness {
    Harness::with(
        default_platform(),
        InternalPayoutProvider::new().with_latency(Duration::from_millis(25)),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_completions_pay_out_once() {
    let h = slow_harness();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;

    let events: Vec<_> = (0..8)
        .map(|i| completed_event(&new_event_id(), &req.external_checkout_ref, &format!("payer{i}@example.com")))
        .collect();
    let outcomes = join_all(events.iter().map(|e| h.deliver(e))).await;

    let paid = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(WebhookOutcome::Paid { .. })))
        .count();
    let noops = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(WebhookOutcome::NoOp { .. })))
        .count();
    assert_eq!(paid, 1);
    assert_eq!(noops, 7);

    let settled = h.current(&req).await;
    assert_eq!(settled.status, PaymentStatus::Paid);
    assert_eq!(settled.payout_status, PayoutStatus::Completed);
    assert_eq!(h.provider.transfer_count(), 2);
    assert_eq!(h.provider.balance(ALICE), 800);
    assert_eq!(h.provider.balance(HOST_DESTINATION), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_retries_single_winner() {
    let h = slow_harness();
    h.onboard("user-1", ALICE).await;
    h.provider.fail_destination(ALICE, "recipient account locked");
    let req = h.issue("user-1", 1000).await;

    h.deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();
    assert_eq!(h.current(&req).await.payout_status, PayoutStatus::Failed);
    h.provider.clear_failures();

    let attempts = join_all((0..10).map(|_| h.settlement.trigger_payout(req.id))).await;
    let finished = attempts
        .iter()
        .filter(|a| matches!(a, Ok(PayoutAttempt::Finished(_))))
        .count();
    let refused = attempts
        .iter()
        .filter(|a| {
            matches!(
                a,
                Ok(PayoutAttempt::AlreadyInProgress) | Ok(PayoutAttempt::NotEligible(_))
            )
        })
        .count();
    assert_eq!(finished, 1);
    assert_eq!(refused, 9);

    assert_eq!(h.current(&req).await.payout_status, PayoutStatus::Completed);
    assert_eq!(h.provider.balance(ALICE), 800);
    assert_eq!(h.provider.balance(HOST_DESTINATION), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_triggers_across_requests() {
    let h = std::sync::Arc::new(slow_harness());
    h.onboard("user-1", ALICE).await;
    h.provider.fail_destination(ALICE, "temporarily unavailable");

    let mut ids = Vec::new();
    for amount in [500, 1000, 2500] {
        let req = h.issue("user-1", amount).await;
        h.deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
            .await
            .unwrap();
        ids.push(req.id);
    }
    h.provider.clear_failures();

    let mut handles = Vec::new();
    for id in &ids {
        for _ in 0..4 {
            let h = h.clone();
            let id = *id;
            handles.push(tokio::spawn(async move { h.settlement.trigger_payout(id).await }));
        }
    }
    let finished = join_all(handles)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(PayoutAttempt::Finished(_)))))
        .count();
    assert_eq!(finished, ids.len());

    // 20% of 500 + 1000 + 2500.
    assert_eq!(h.provider.balance(HOST_DESTINATION), 100 + 200 + 500);
    assert_eq!(h.provider.balance(ALICE), 400 + 800 + 2000);
}
