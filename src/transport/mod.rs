//! Peer Transport
//!
//! The engine only needs two things from the network: whether the transport
//! is reachable, and dispatch of an opaque envelope with an acknowledgement.

pub mod channel;
pub mod onion;

pub use channel::{ChannelTransport, TransportReceiver, transport_channel};
pub use onion::OnionServiceClient;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Protocol message carried by an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ReceiverCommit,
    PublicKeyAgreement,
    RedemptionKey,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::ReceiverCommit => "RECEIVER_COMMIT",
            MessageKind::PublicKeyAgreement => "PUBLIC_KEY_AGREEMENT",
            MessageKind::RedemptionKey => "REDEMPTION_KEY",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outbound message; `body` is opaque to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub transaction_id: Uuid,
    pub kind: MessageKind,
    /// Receiver address (hex public key)
    pub address: String,
    pub body: String,
}

impl MessageEnvelope {
    pub fn new(kind: MessageKind, address: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            kind,
            address: address.into(),
            body: body.into(),
        }
    }
}

/// Peer acknowledgement of a dispatched envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchAck {
    pub transaction_id: Uuid,
    pub receipt: String,
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Transport unreachable")]
    Unreachable,

    #[error("Peer rejected message: {0}")]
    Rejected(String),

    #[error("Dispatch timed out after {0} ms")]
    Timeout(u64),

    #[error("Transport channel closed")]
    Closed,
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn is_reachable(&self) -> bool;

    async fn dispatch(&self, envelope: MessageEnvelope) -> Result<DispatchAck, TransportError>;
}
