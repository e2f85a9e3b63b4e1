use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use splitpay_core::{Cents, RecipientId};
use uuid::Uuid;

use crate::error::{PayoutError, SettlementError};
use crate::traits::{validate_instruction, CheckoutGateway, PayoutProvider};
use crate::types::{
    CheckoutRequest, CheckoutSession, LegKind, PayoutInstruction, PayoutReceipt,
};

/// One accepted transfer in the internal ledger.
#[derive(Debug, Clone)]
struct LedgerEntry {
    receipt: PayoutReceipt,
    leg: LegKind,
    destination: String,
    amount_cents: Cents,
    note: String,
}

/// In-memory payout rail.
///
/// Keeps a ledger keyed by idempotency key, so a repeated instruction is
/// answered with the original receipt instead of a second credit. Useful for
/// local runs and tests; failures and latency can be injected per instance.
pub struct InternalPayoutProvider {
    /// Accepted transfers keyed by idempotency key.
    ledger: DashMap<String, LedgerEntry>,
    /// Credited total per destination.
    balances: DashMap<String, Cents>,
    /// Destinations that reject every transfer, with the rejection reason.
    failures: DashMap<String, String>,
    calls: AtomicUsize,
    latency: Duration,
}

impl InternalPayoutProvider {
    pub fn new() -> Self {
        Self {
            ledger: DashMap::new(),
            balances: DashMap::new(),
            failures: DashMap::new(),
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every transfer to `destination` fail with `reason`.
    pub fn fail_destination(&self, destination: &str, reason: &str) {
        self.failures
            .insert(destination.to_string(), reason.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Total credited to `destination`.
    pub fn balance(&self, destination: &str) -> Cents {
        self.balances.get(destination).map(|v| *v).unwrap_or(0)
    }

    /// Number of `send_payout` calls received, including replays and failures.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of distinct transfers accepted.
    pub fn transfer_count(&self) -> usize {
        self.ledger.len()
    }

    /// Notes of every accepted transfer.
    pub fn notes(&self) -> Vec<String> {
        self.ledger.iter().map(|e| e.note.clone()).collect()
    }

    /// Amount credited by each accepted transfer of the given leg.
    pub fn transfers_for(&self, leg: LegKind) -> Vec<(String, Cents)> {
        self.ledger
            .iter()
            .filter(|e| e.leg == leg)
            .map(|e| (e.destination.clone(), e.amount_cents))
            .collect()
    }
}

impl Default for InternalPayoutProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayoutProvider for InternalPayoutProvider {
    async fn send_payout(
        &self,
        instruction: &PayoutInstruction,
    ) -> Result<PayoutReceipt, PayoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        validate_instruction(instruction)?;
        if let Some(reason) = self.failures.get(&instruction.destination) {
            return Err(PayoutError::Rejected {
                status: 422,
                message: reason.clone(),
            });
        }

        match self.ledger.entry(instruction.idempotency_key.clone()) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    idempotency_key = %instruction.idempotency_key,
                    "Internal payout replayed"
                );
                Ok(PayoutReceipt {
                    replayed: true,
                    ..existing.get().receipt.clone()
                })
            }
            Entry::Vacant(slot) => {
                let receipt = PayoutReceipt {
                    batch_ref: format!("int-batch-{}", Uuid::now_v7().simple()),
                    item_ref: Some(format!("int-item-{}", Uuid::now_v7().simple())),
                    replayed: false,
                };
                slot.insert(LedgerEntry {
                    receipt: receipt.clone(),
                    leg: instruction.leg,
                    destination: instruction.destination.clone(),
                    amount_cents: instruction.amount_cents,
                    note: instruction.note.clone(),
                });
                self.balances
                    .entry(instruction.destination.clone())
                    .and_modify(|b| *b += instruction.amount_cents)
                    .or_insert(instruction.amount_cents);

                tracing::info!(
                    batch_ref = %receipt.batch_ref,
                    leg = %instruction.leg,
                    amount_cents = instruction.amount_cents,
                    "Internal payout recorded"
                );
                Ok(receipt)
            }
        }
    }

    fn provider_id(&self) -> &str {
        "pp-internal"
    }
}

#[derive(Debug, Clone)]
struct IssuedLink {
    recipient_id: RecipientId,
    amount_cents: Cents,
}

/// In-memory checkout gateway issuing links under a local base URL.
pub struct InternalGateway {
    base_url: String,
    sessions: DashMap<String, IssuedLink>,
    unavailable: AtomicBool,
}

impl InternalGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sessions: DashMap::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every `create_checkout` fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Recipient and amount a link was issued for.
    pub fn issued(&self, checkout_ref: &str) -> Option<(RecipientId, Cents)> {
        self.sessions
            .get(checkout_ref)
            .map(|s| (s.recipient_id.clone(), s.amount_cents))
    }
}

#[async_trait]
impl CheckoutGateway for InternalGateway {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, SettlementError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SettlementError::Gateway("internal gateway unavailable".into()));
        }

        let checkout_ref = format!("plink_{}", Uuid::now_v7().simple());
        let checkout_url = format!("{}/pay/{}", self.base_url, checkout_ref);
        self.sessions.insert(
            checkout_ref.clone(),
            IssuedLink {
                recipient_id: request.recipient_id.clone(),
                amount_cents: request.amount_cents,
            },
        );
        tracing::debug!(checkout_ref = %checkout_ref, "Internal checkout link created");
        Ok(CheckoutSession {
            checkout_ref,
            checkout_url,
        })
    }

    fn gateway_id(&self) -> &str {
        "gw-internal"
    }
}
