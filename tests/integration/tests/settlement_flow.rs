//! Integration test: payment link to split payout across the settlement crates.

use splitpay_core::{PaymentStatus, PayoutStatus};
use splitpay_settlement::{LegKind, PayoutAttempt, SettlementError, WebhookOutcome};
use splitpay_integration_tests::{
    completed_event, deactivated_event, new_event_id, Harness, HOST_DESTINATION,
};

const ALICE: &str = "alice@example.com";

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_checkout_completion_settles_both_legs() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;
    assert_eq!(req.status, PaymentStatus::Pending);
    assert_eq!(req.payout_status, PayoutStatus::Unset);

    let outcome = h
        .deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Paid {
            payment_request_id: req.id,
            payout_status: PayoutStatus::Completed,
        }
    );

    let settled = h.current(&req).await;
    assert_eq!(settled.status, PaymentStatus::Paid);
    assert_eq!(settled.payout_status, PayoutStatus::Completed);
    assert_eq!(settled.platform_fee_cents, Some(200));
    assert_eq!(settled.payout_amount_cents, Some(800));
    assert_eq!(settled.paid_by_identifier.as_deref(), Some("bob@example.com"));
    assert!(settled.paid_at.is_some());
    assert!(settled.payout_completed_at.is_some());
    assert!(settled.payout_provider_ref.is_some());
    assert!(settled.platform_payout_ref.is_some());
    assert!(settled.payout_error.is_none());

    assert_eq!(h.provider.balance(ALICE), 800);
    assert_eq!(h.provider.balance(HOST_DESTINATION), 200);
    assert_eq!(h.provider.transfers_for(LegKind::Recipient).len(), 1);
    assert_eq!(h.provider.transfers_for(LegKind::Platform).len(), 1);
}

#[tokio::test]
async fn test_payout_notes_reference_description() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;
    h.deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();

    let notes = h.provider.notes();
    assert!(notes.contains(&"Payment for: Dinner".to_string()));
    assert!(notes.contains(&"Platform fee for: Dinner".to_string()));
}

// =========================================================================
// Duplicate and unmatched events
// =========================================================================

#[tokio::test]
async fn test_redelivered_event_is_duplicate() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;
    let event = completed_event("evt_same", &req.external_checkout_ref, "bob@example.com");

    h.deliver(&event).await.unwrap();
    let calls = h.provider.call_count();

    assert_eq!(h.deliver(&event).await.unwrap(), WebhookOutcome::Duplicate);
    assert_eq!(h.provider.call_count(), calls);
}

#[tokio::test]
async fn test_second_completion_for_paid_request_is_noop() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;

    h.deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();
    let calls = h.provider.call_count();

    let again = h
        .deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "eve@example.com"))
        .await
        .unwrap();
    assert_eq!(
        again,
        WebhookOutcome::NoOp {
            payment_request_id: req.id,
            status: PaymentStatus::Paid,
        }
    );
    assert_eq!(h.provider.call_count(), calls);
    assert_eq!(
        h.current(&req).await.paid_by_identifier.as_deref(),
        Some("bob@example.com")
    );
}

#[tokio::test]
async fn test_unknown_checkout_is_unmatched() {
    let h = Harness::new();
    let outcome = h
        .deliver(&completed_event(&new_event_id(), "plink_unknown", "bob@example.com"))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Unmatched);
    assert!(h.store.is_empty());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;

    let payload = serde_json::to_vec(&completed_event(
        &new_event_id(),
        &req.external_checkout_ref,
        "bob@example.com",
    ))
    .unwrap();
    let header = splitpay_crypto::signature_header("not-the-secret", chrono::Utc::now().timestamp(), &payload);
    let result = h.ingestor.ingest(&payload, Some(&header)).await;

    assert!(matches!(result, Err(SettlementError::Unauthorized(_))));
    assert_eq!(h.current(&req).await.status, PaymentStatus::Pending);
}

// =========================================================================
// Expiry and cancellation
// =========================================================================

#[tokio::test]
async fn test_late_completion_after_expiry_is_noop() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;

    let expired = h
        .deliver(&deactivated_event(&new_event_id(), &req.external_checkout_ref))
        .await
        .unwrap();
    assert_eq!(expired, WebhookOutcome::Expired { payment_request_id: req.id });

    let late = h
        .deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();
    assert!(matches!(late, WebhookOutcome::NoOp { status: PaymentStatus::Expired, .. }));
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_cancelled_request_cannot_be_paid() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;

    let change = h
        .issuer
        .cancel(req.id, &req.recipient_id)
        .await
        .unwrap();
    assert!(change.is_applied());

    let outcome = h
        .deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::NoOp { status: PaymentStatus::Cancelled, .. }));
}

// =========================================================================
// Failure and retry
// =========================================================================

#[tokio::test]
async fn test_platform_leg_failure_keeps_recipient_transfer() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    h.provider.fail_destination(HOST_DESTINATION, "account restricted");
    let req = h.issue("user-1", 1000).await;

    let outcome = h
        .deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Paid {
            payment_request_id: req.id,
            payout_status: PayoutStatus::Failed,
        }
    );

    let failed = h.current(&req).await;
    assert_eq!(failed.status, PaymentStatus::Paid);
    assert_eq!(failed.payout_status, PayoutStatus::Failed);
    assert!(failed.payout_provider_ref.is_some());
    let error = failed.payout_error.unwrap();
    assert!(error.contains("Platform payout failed"));
    assert!(!error.contains("Recipient payout failed"));
    assert_eq!(h.provider.balance(ALICE), 800);
    assert_eq!(h.provider.balance(HOST_DESTINATION), 0);

    // Retry once the host account is fixed: the recipient is not paid twice.
    h.provider.clear_failures();
    let PayoutAttempt::Finished(retry) = h.settlement.trigger_payout(req.id).await.unwrap() else {
        panic!("retry should run");
    };
    assert!(retry.is_completed());
    assert_eq!(h.provider.balance(ALICE), 800);
    assert_eq!(h.provider.balance(HOST_DESTINATION), 200);
    assert!(h.current(&req).await.payout_error.is_none());
}

#[tokio::test]
async fn test_manual_trigger_on_pending_request_is_not_eligible() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;

    let attempt = h.settlement.trigger_payout(req.id).await.unwrap();
    assert!(matches!(attempt, PayoutAttempt::NotEligible(_)));
    assert_eq!(h.current(&req).await.payout_status, PayoutStatus::Unset);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_trigger_after_completion_is_not_eligible() {
    let h = Harness::new();
    h.onboard("user-1", ALICE).await;
    let req = h.issue("user-1", 1000).await;
    h.deliver(&completed_event(&new_event_id(), &req.external_checkout_ref, "bob@example.com"))
        .await
        .unwrap();

    let attempt = h.settlement.trigger_payout(req.id).await.unwrap();
    assert!(matches!(attempt, PayoutAttempt::NotEligible(_)));
    assert_eq!(h.provider.transfer_count(), 2);
}

#[tokio::test]
async fn test_issue_without_destination_rejected() {
    let h = Harness::new();
    let result = h
        .issuer
        .issue(splitpay_settlement::IssueRequest {
            recipient_id: splitpay_core::RecipientId::new("user-2"),
            amount_cents: 1000,
            description: None,
        })
        .await;
    assert!(matches!(result, Err(SettlementError::MissingPayoutDestination(_))));
    assert_eq!(h.gateway.session_count(), 0);
}
