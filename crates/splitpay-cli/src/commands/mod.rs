pub mod init;
pub mod payout;
pub mod profile;
pub mod request;
pub mod simulate;
pub mod status;
