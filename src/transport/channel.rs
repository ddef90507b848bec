//! Channel Transport
//!
//! In-process transport: envelopes travel over an mpsc channel and each one
//! carries a oneshot sender for the peer's acknowledgement.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{DispatchAck, MessageEnvelope, MessageTransport, OnionServiceClient, TransportError};

/// Envelope delivered to the peer side
#[derive(Debug)]
pub struct InboundMessage {
    pub envelope: MessageEnvelope,
    /// Reply channel (oneshot)
    pub ack_tx: oneshot::Sender<Result<DispatchAck, String>>,
}

impl InboundMessage {
    /// Acknowledge with a receipt string
    pub fn accept(self, receipt: impl Into<String>) {
        let ack = DispatchAck {
            transaction_id: self.envelope.transaction_id,
            receipt: receipt.into(),
        };
        let _ = self.ack_tx.send(Ok(ack));
    }

    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.ack_tx.send(Err(reason.into()));
    }
}

/// Sender side, handed to the transfer engine
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<InboundMessage>,
    timeout: Duration,
    onion: Option<Arc<OnionServiceClient>>,
}

impl ChannelTransport {
    /// Require the onion service to be up before reporting reachable
    pub fn with_onion(mut self, onion: Arc<OnionServiceClient>) -> Self {
        self.onion = Some(onion);
        self
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn is_reachable(&self) -> bool {
        if self.tx.is_closed() {
            return false;
        }
        match &self.onion {
            Some(onion) => onion.is_reachable(),
            None => true,
        }
    }

    async fn dispatch(&self, envelope: MessageEnvelope) -> Result<DispatchAck, TransportError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let kind = envelope.kind;
        let transaction_id = envelope.transaction_id;

        self.tx
            .send(InboundMessage { envelope, ack_tx })
            .await
            .map_err(|_| TransportError::Closed)?;

        let reply = tokio::time::timeout(self.timeout, ack_rx)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|_| TransportError::Closed)?;

        match reply {
            Ok(ack) => {
                debug!(%transaction_id, kind = %kind, "Message acknowledged");
                Ok(ack)
            }
            Err(reason) => {
                warn!(%transaction_id, kind = %kind, reason = %reason, "Message rejected");
                Err(TransportError::Rejected(reason))
            }
        }
    }
}

/// Peer side of the channel
pub struct TransportReceiver {
    rx: mpsc::Receiver<InboundMessage>,
}

impl TransportReceiver {
    /// Try to receive an envelope (non-blocking)
    pub fn try_recv(&mut self) -> Option<InboundMessage> {
        self.rx.try_recv().ok()
    }

    /// Receive an envelope (waits until available or closed)
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    /// Spawn a task that accepts every envelope, replying with `ack:<kind>`
    pub fn spawn_auto_ack(mut self) -> tokio::task::JoinHandle<usize> {
        tokio::spawn(async move {
            let mut count = 0;
            while let Some(msg) = self.recv().await {
                let receipt = format!("ack:{}", msg.envelope.kind);
                msg.accept(receipt);
                count += 1;
            }
            count
        })
    }
}

/// Create a new transport pair
pub fn transport_channel(buffer: usize, timeout: Duration) -> (ChannelTransport, TransportReceiver) {
    let (tx, rx) = mpsc::channel(buffer);
    (
        ChannelTransport {
            tx,
            timeout,
            onion: None,
        },
        TransportReceiver { rx },
    )
}
