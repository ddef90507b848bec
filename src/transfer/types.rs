//! Transfer Core Types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::secret::{SecretBytes, SecretString};
use crate::transport::DispatchAck;
use crate::vault::VaultAuth;

/// Session identifier - ULID based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(ulid::Ulid);

impl SessionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Transfer request submitted by the caller
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub amount: Decimal,
    /// Sending wallet and its credential
    pub sender: VaultAuth,
    /// Receiver public key (hex); also the message address
    pub receiver_public_key: String,
}

impl Session {
    pub fn new(amount: Decimal, sender: VaultAuth, receiver_public_key: impl Into<String>) -> Self {
        Self {
            session_id: SessionId::new(),
            amount,
            sender,
            receiver_public_key: receiver_public_key.into(),
        }
    }
}

/// Result of burning the session amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnReceipt {
    /// Hash of the Send record written to the wallet
    pub hash: String,
    /// Hashes of the coins marked spent
    pub selected: Vec<String>,
    /// Overshoot returned to the sender as a change record
    pub change: Decimal,
}

/// Ephemeral key pair sent in the public-key agreement
#[derive(Debug, Clone)]
pub struct PublicKeyAgreement {
    pub public_key: String,
    pub secret_key: SecretString,
    pub ack: DispatchAck,
}

#[derive(Debug, Clone)]
pub struct RedemptionKey {
    pub key: SecretBytes,
    pub ack: DispatchAck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAgreement {
    pub amount: Decimal,
    pub agreed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_session_id_parse() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-ulid".parse::<SessionId>().is_err());
    }
}
