pub mod internal;
pub mod paypal;
pub mod stripe;

pub use internal::{InternalGateway, InternalPayoutProvider};
pub use paypal::{PaypalConfig, PaypalPayoutProvider};
pub use stripe::{StripeCheckoutGateway, StripeConfig};
