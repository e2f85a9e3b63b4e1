pub mod error;
pub mod signing;
pub mod hashing;

pub use error::CryptoError;
pub use hashing::idempotency_key;
pub use signing::{
    signature_header, sign_payload, WebhookVerifier, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER,
};
