//! Splitpay Settlement Layer
//!
//! Turns a verified gateway notification into exactly one settled payment
//! request: the webhook ingestor applies `pending → paid`, the status
//! reconciler hands out the single payout claim, and the orchestrator runs the
//! recipient and platform legs against a pluggable payout provider.

pub mod error;
pub mod types;
pub mod traits;
pub mod store;
pub mod reconciler;
pub mod orchestrator;
pub mod manager;
pub mod issuer;
pub mod webhook;
pub mod adapters;

pub use error::{PayoutError, SettlementError};
pub use issuer::{IssueRequest, PaymentLinkIssuer};
pub use manager::SettlementManager;
pub use orchestrator::PayoutOrchestrator;
pub use reconciler::StatusReconciler;
pub use store::InMemoryPaymentStore;
pub use traits::{CheckoutGateway, PaymentStore, PayoutProvider};
pub use types::{
    CheckoutRequest, CheckoutSession, ClaimOutcome, ConditionalUpdate, LegKind, LegOutcome,
    PayoutAttempt, PayoutInstruction, PayoutReceipt, SettlementOutcome, StatusChange,
};
pub use webhook::{GatewayEvent, WebhookIngestor, WebhookOutcome};
