//! Wallet Types
//!
//! Records persisted inside the wallet document.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::secret::SecretString;

/// Direction of a transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Receive,
    Send,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Receive => "RECEIVE",
            TransactionKind::Send => "SEND",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Signed value record
///
/// Positive amounts are received, negative amounts are sent or burned.
/// `hash` is unique per record and records are never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub amount: Decimal,
    pub kind: TransactionKind,
    /// Monotonic ordering key
    pub version: u64,
    /// Correlation tag
    pub stamp: String,
    pub hash: String,
}

impl TransactionRecord {
    pub fn new(
        amount: Decimal,
        kind: TransactionKind,
        version: u64,
        stamp: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            kind,
            version,
            stamp: stamp.into(),
            hash: hash.into(),
        }
    }
}

/// Coin selector output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionChange {
    /// Selected records, a record repeats once per unit it contributes
    pub transactions: Vec<TransactionRecord>,
    /// First record whose absolute amount is closest to `residual`
    pub closest: Option<TransactionRecord>,
    /// `requested - sum(|selected|)`
    pub residual: Decimal,
}

impl TransactionChange {
    /// Total absolute value of the selection
    pub fn selected_total(&self) -> Decimal {
        self.transactions.iter().map(|t| t.amount.abs()).sum()
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        self.residual.is_zero()
    }
}

/// Marks `coin` as consumed by the burn recorded under `burn`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentCoin {
    pub coin: String,
    pub burn: String,
}

/// What a burn consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnOutcome {
    /// Hashes of the coins marked spent
    pub coins: Vec<String>,
    /// Value returned to the wallet as a change record
    pub change: Decimal,
    /// `false` when the burn had already been recorded
    pub written: bool,
}

/// Per-counterparty message tracking entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTrack {
    pub public_key: String,
    /// Messages dispatched to this key
    pub count: u32,
    pub updated_at: DateTime<Utc>,
}

impl MessageTrack {
    pub fn new(public_key: impl Into<String>, count: u32) -> Self {
        Self {
            public_key: public_key.into(),
            count,
            updated_at: Utc::now(),
        }
    }
}

/// Public/secret key pair with its address
#[derive(Debug, Clone)]
pub struct KeySet {
    pub public_key: String,
    pub secret_key: SecretString,
    pub address: String,
}
