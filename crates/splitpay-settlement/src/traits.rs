use async_trait::async_trait;
use splitpay_core::{PaymentRequest, PaymentRequestId, RecipientId, RecipientPayoutProfile};

use crate::error::{PayoutError, SettlementError};
use crate::types::{
    CheckoutRequest, CheckoutSession, ConditionalUpdate, PayoutInstruction, PayoutReceipt,
};

/// Condition-and-update closure for [`PaymentStore::update_if`]. Returning
/// `None` means the condition does not hold and nothing is written.
pub type UpdateFn<'a> = dyn Fn(&PaymentRequest) -> Option<PaymentRequest> + Send + Sync + 'a;

/// Durable storage of payment requests, payout profiles and processed events.
///
/// `update_if` is the only way status fields change. Implementations must
/// evaluate the closure and write its result as one atomic step, so that of
/// two concurrent callers whose conditions exclude each other exactly one sees
/// [`ConditionalUpdate::Applied`].
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new request. Fails if the id or checkout reference is taken.
    async fn insert(&self, request: PaymentRequest) -> Result<(), SettlementError>;

    async fn get(&self, id: PaymentRequestId) -> Result<Option<PaymentRequest>, SettlementError>;

    async fn find_by_checkout_ref(
        &self,
        checkout_ref: &str,
    ) -> Result<Option<PaymentRequest>, SettlementError>;

    async fn find_by_checkout_url(
        &self,
        checkout_url: &str,
    ) -> Result<Option<PaymentRequest>, SettlementError>;

    /// Atomically apply `update` to the current record.
    ///
    /// Returns [`SettlementError::NotFound`] if no such request exists.
    async fn update_if(
        &self,
        id: PaymentRequestId,
        update: &UpdateFn<'_>,
    ) -> Result<ConditionalUpdate, SettlementError>;

    async fn get_profile(
        &self,
        recipient_id: &RecipientId,
    ) -> Result<Option<RecipientPayoutProfile>, SettlementError>;

    async fn put_profile(&self, profile: RecipientPayoutProfile) -> Result<(), SettlementError>;

    /// Record a gateway event id. Returns `false` if it was already recorded.
    async fn record_event(&self, event_id: &str) -> Result<bool, SettlementError>;

    async fn is_event_recorded(&self, event_id: &str) -> Result<bool, SettlementError>;
}

/// A payout rail able to send money to an email destination.
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Send one transfer. Repeating an instruction with the same idempotency
    /// key must not transfer twice.
    async fn send_payout(
        &self,
        instruction: &PayoutInstruction,
    ) -> Result<PayoutReceipt, PayoutError>;

    /// Unique identifier of this provider (e.g. "pp-internal").
    fn provider_id(&self) -> &str;
}

/// A payment gateway that hosts checkout links.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, SettlementError>;

    fn gateway_id(&self) -> &str;
}

/// Shared precondition for provider adapters: positive amount and a
/// well-formed destination.
pub fn validate_instruction(instruction: &PayoutInstruction) -> Result<(), PayoutError> {
    if instruction.amount_cents <= 0 {
        return Err(PayoutError::InvalidInstruction(format!(
            "amount must be positive, got {}",
            instruction.amount_cents
        )));
    }
    if !splitpay_core::types::is_valid_payout_email(&instruction.destination) {
        return Err(PayoutError::InvalidInstruction(format!(
            "invalid destination: {}",
            instruction.destination
        )));
    }
    Ok(())
}
