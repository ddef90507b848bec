//! Wallet
//!
//! - [`types`] - transaction records, change result, message tracking
//! - [`change`] - greedy change selection (pure, safe to call concurrently)
//! - [`service`] - wallet document access through the secret store

pub mod change;
pub mod service;
pub mod types;

pub use change::{MAX_UNITS_PER_RECORD, calculate_change, calculate_change_for_stamp, select_coins};
pub use service::{ADDRESS, PUBLIC_KEY, SECRET_KEY, WalletError, WalletService, change_hash};
pub use types::{
    BurnOutcome, KeySet, MessageTrack, SpentCoin, TransactionChange, TransactionKind,
    TransactionRecord,
};
