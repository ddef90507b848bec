//! Protocol States and Triggers
//!
//! State IDs are stable small integers so a session's state can be mirrored in
//! an atomic and read without taking the session lock.

use std::fmt;

/// Transfer protocol states
///
/// Terminal state: COMPLETED (80). Every state after NEW accepts `Verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ProtocolState {
    /// Session registered, nothing executed
    New = 0,

    /// Funds checked for the session amount
    Audited = 10,

    /// Spend key unlocked
    Keys = 20,

    /// Selected coins burned (irreversible)
    Burned = 30,

    /// Receiver commitment dispatched
    Committed = 40,

    /// Public-key agreement dispatched
    PublicKeyAgree = 50,

    /// Redemption key dispatched
    RedemptionKey = 60,

    /// Payment agreement finalized
    Payment = 70,

    /// Terminal: transfer finished
    Completed = 80,
}

impl ProtocolState {
    pub const ALL: [ProtocolState; 9] = [
        ProtocolState::New,
        ProtocolState::Audited,
        ProtocolState::Keys,
        ProtocolState::Burned,
        ProtocolState::Committed,
        ProtocolState::PublicKeyAgree,
        ProtocolState::RedemptionKey,
        ProtocolState::Payment,
        ProtocolState::Completed,
    ];

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolState::Completed)
    }

    /// True once the burn has happened and value is committed to the receiver
    #[inline]
    pub fn is_irreversible(&self) -> bool {
        self.id() >= ProtocolState::Burned.id()
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(ProtocolState::New),
            10 => Some(ProtocolState::Audited),
            20 => Some(ProtocolState::Keys),
            30 => Some(ProtocolState::Burned),
            40 => Some(ProtocolState::Committed),
            50 => Some(ProtocolState::PublicKeyAgree),
            60 => Some(ProtocolState::RedemptionKey),
            70 => Some(ProtocolState::Payment),
            80 => Some(ProtocolState::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolState::New => "NEW",
            ProtocolState::Audited => "AUDITED",
            ProtocolState::Keys => "KEYS",
            ProtocolState::Burned => "BURNED",
            ProtocolState::Committed => "COMMITTED",
            ProtocolState::PublicKeyAgree => "PUBLIC_KEY_AGREE",
            ProtocolState::RedemptionKey => "REDEMPTION_KEY",
            ProtocolState::Payment => "PAYMENT",
            ProtocolState::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for ProtocolState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        ProtocolState::from_id(value).ok_or(())
    }
}

/// Protocol triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Verify,
    Unlock,
    Torch,
    Commit,
    PublicKeyAgreement,
    PrepareRedemptionKey,
    PaymentAgreement,
    Complete,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Verify => "VERIFY",
            Trigger::Unlock => "UNLOCK",
            Trigger::Torch => "TORCH",
            Trigger::Commit => "COMMIT",
            Trigger::PublicKeyAgreement => "PUBLIC_KEY_AGREEMENT",
            Trigger::PrepareRedemptionKey => "PREPARE_REDEMPTION_KEY",
            Trigger::PaymentAgreement => "PAYMENT_AGREEMENT",
            Trigger::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        for state in ProtocolState::ALL {
            assert_eq!(state.is_terminal(), state == ProtocolState::Completed);
        }
    }

    #[test]
    fn test_irreversible_states() {
        assert!(!ProtocolState::New.is_irreversible());
        assert!(!ProtocolState::Audited.is_irreversible());
        assert!(!ProtocolState::Keys.is_irreversible());
        assert!(ProtocolState::Burned.is_irreversible());
        assert!(ProtocolState::Payment.is_irreversible());
        assert!(ProtocolState::Completed.is_irreversible());
    }

    #[test]
    fn test_state_id_roundtrip() {
        for state in ProtocolState::ALL {
            assert_eq!(ProtocolState::from_id(state.id()), Some(state));
        }
    }

    #[test]
    fn test_invalid_state_id() {
        assert!(ProtocolState::from_id(999).is_none());
        assert!(ProtocolState::try_from(-1).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ProtocolState::New.to_string(), "NEW");
        assert_eq!(ProtocolState::PublicKeyAgree.to_string(), "PUBLIC_KEY_AGREE");
        assert_eq!(Trigger::Torch.to_string(), "TORCH");
    }
}
