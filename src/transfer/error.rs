//! Transfer Error Types
//!
//! Entry-action failures carry the state whose entry action failed. The
//! session stays in its last successfully entered state, so the caller can
//! retry with `Verify`.

use rust_decimal::Decimal;
use thiserror::Error;

use super::state::{ProtocolState, Trigger};
use super::types::SessionId;
use crate::transport::MessageKind;

#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Session validation ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Receiver public key is missing")]
    MissingReceiver,

    // === Entry-action failures ===
    #[error("Insufficient funds entering {state}: {required} required ({cause})")]
    InsufficientFunds {
        state: ProtocolState,
        required: Decimal,
        cause: String,
    },

    #[error("Key unlock failed entering {state}: {cause}")]
    KeyUnlockFailure { state: ProtocolState, cause: String },

    #[error("Burn failed entering {state}: {cause}")]
    BurnFailure { state: ProtocolState, cause: String },

    #[error("{message} dispatch failed entering {state}: {cause}")]
    DispatchFailure {
        state: ProtocolState,
        message: MessageKind,
        cause: String,
    },

    // === Contract violations ===
    #[error("Trigger {trigger} not permitted from {state}")]
    InvalidTransition {
        state: ProtocolState,
        trigger: Trigger,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Transition table invalid: {0}")]
    InvalidTransitionTable(String),
}

impl TransferError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::MissingReceiver => "MISSING_RECEIVER",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::KeyUnlockFailure { .. } => "KEY_UNLOCK_FAILURE",
            TransferError::BurnFailure { .. } => "BURN_FAILURE",
            TransferError::DispatchFailure { .. } => "DISPATCH_FAILURE",
            TransferError::InvalidTransition { .. } => "INVALID_TRANSITION",
            TransferError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            TransferError::InvalidTransitionTable(_) => "INVALID_TRANSITION_TABLE",
        }
    }

    /// State whose entry action (or trigger) failed
    pub fn state(&self) -> Option<ProtocolState> {
        match self {
            TransferError::InsufficientFunds { state, .. }
            | TransferError::KeyUnlockFailure { state, .. }
            | TransferError::BurnFailure { state, .. }
            | TransferError::DispatchFailure { state, .. }
            | TransferError::InvalidTransition { state, .. } => Some(*state),
            _ => None,
        }
    }

    /// Programming-contract violations; log, do not retry
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransferError::InvalidTransition { .. }
                | TransferError::SessionNotFound(_)
                | TransferError::InvalidTransitionTable(_)
        )
    }

    /// Failures a caller may retry by firing `Verify`
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::InsufficientFunds { .. }
                | TransferError::KeyUnlockFailure { .. }
                | TransferError::BurnFailure { .. }
                | TransferError::DispatchFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::InvalidAmount.code(), "INVALID_AMOUNT");
        assert_eq!(
            TransferError::SessionNotFound(SessionId::new()).code(),
            "SESSION_NOT_FOUND"
        );
        let err = TransferError::InvalidTransition {
            state: ProtocolState::New,
            trigger: Trigger::Torch,
        };
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_originating_state() {
        let err = TransferError::DispatchFailure {
            state: ProtocolState::Committed,
            message: MessageKind::ReceiverCommit,
            cause: "Transport unreachable".into(),
        };
        assert_eq!(err.state(), Some(ProtocolState::Committed));
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "RECEIVER_COMMIT dispatch failed entering COMMITTED: Transport unreachable"
        );
        assert_eq!(TransferError::MissingReceiver.state(), None);
    }

    #[test]
    fn test_display() {
        let err = TransferError::InsufficientFunds {
            state: ProtocolState::Audited,
            required: Decimal::from(50),
            cause: "available 10".into(),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds entering AUDITED: 50 required (available 10)"
        );
    }
}
