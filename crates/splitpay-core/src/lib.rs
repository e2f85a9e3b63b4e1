pub mod error;
pub mod types;
pub mod state_machine;
pub mod fee;
pub mod config;

pub use config::PlatformConfig;
pub use error::CoreError;
pub use fee::{calculate_fee_split, FeeSplit};
pub use state_machine::{
    PaymentEvent, PaymentStateMachine, PaymentStatus, PayoutEvent, PayoutStateMachine,
    PayoutStatus,
};
pub use types::{
    Cents, PaidDetails, PaymentRequest, PaymentRequestId, PayoutResolution, RecipientId,
    RecipientPayoutProfile,
};
