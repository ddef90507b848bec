//! Wallet Adapters
//!
//! The engine reaches the sender's wallet only through [`WalletAdapter`].
//! Every method must be safe to call again for the same session: a retried
//! burn must not spend twice.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{BurnReceipt, SessionId};
use crate::secret::SecretBytes;
use crate::vault::VaultAuth;
use crate::wallet::{MessageTrack, SECRET_KEY, WalletError, WalletService};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("{0}")]
    Failed(String),
}

/// Hash of the Send record written by a session's burn
pub fn burn_hash(session_id: SessionId) -> String {
    format!("burn-{}", session_id)
}

/// Funds and key collaborator
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Whether the sender can cover `amount` for this session
    ///
    /// Records already written by the same session do not count against it,
    /// so re-verification after a burn gives the same answer.
    async fn check_sufficient_funds(
        &self,
        session_id: SessionId,
        amount: Decimal,
        sender: &VaultAuth,
    ) -> Result<bool, AdapterError>;

    async fn unlock_spend_key(&self, sender: &VaultAuth) -> Result<SecretBytes, AdapterError>;

    /// Spend coins covering the session amount
    ///
    /// Must fail rather than overdraw when the funds are gone by the time
    /// the burn runs.
    ///
    /// # Idempotency
    /// A second call for the same session returns the original receipt.
    async fn burn(
        &self,
        session_id: SessionId,
        amount: Decimal,
        sender: &VaultAuth,
    ) -> Result<BurnReceipt, AdapterError>;

    /// Bump the message-tracking count for `receiver_public_key`
    async fn record_dispatch(
        &self,
        sender: &VaultAuth,
        receiver_public_key: &str,
    ) -> Result<(), AdapterError>;
}

/// Adapter over the vault-backed [`WalletService`]
pub struct VaultWalletAdapter {
    wallet: Arc<WalletService>,
}

impl VaultWalletAdapter {
    pub fn new(wallet: Arc<WalletService>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletAdapter for VaultWalletAdapter {
    fn name(&self) -> &'static str {
        "vault_wallet"
    }

    async fn check_sufficient_funds(
        &self,
        session_id: SessionId,
        amount: Decimal,
        sender: &VaultAuth,
    ) -> Result<bool, AdapterError> {
        let balance = self.wallet.available_balance(sender).await?;
        let own = self
            .wallet
            .total_transaction_amount(sender, &session_id.to_string())
            .await?;
        let available = balance - own;
        debug!(session_id = %session_id, %available, %amount, "Funds check");
        Ok(available >= amount)
    }

    async fn unlock_spend_key(&self, sender: &VaultAuth) -> Result<SecretBytes, AdapterError> {
        let encoded = self.wallet.store_key(sender, SECRET_KEY).await?;
        let bytes = encoded
            .expose(|s| hex::decode(s))
            .map_err(|e| AdapterError::Failed(format!("spend key is not valid hex: {}", e)))?;
        if bytes.is_empty() {
            return Err(AdapterError::Failed("spend key is empty".into()));
        }
        Ok(SecretBytes::new(bytes))
    }

    async fn burn(
        &self,
        session_id: SessionId,
        amount: Decimal,
        sender: &VaultAuth,
    ) -> Result<BurnReceipt, AdapterError> {
        let hash = burn_hash(session_id);
        let outcome = self
            .wallet
            .burn(sender, &session_id.to_string(), &hash, amount)
            .await?;

        if outcome.written {
            info!(session_id = %session_id, %amount, coins = outcome.coins.len(), change = %outcome.change, "Burned");
        } else {
            debug!(session_id = %session_id, "Burn already recorded");
        }

        Ok(BurnReceipt {
            hash,
            selected: outcome.coins,
            change: outcome.change,
        })
    }

    async fn record_dispatch(
        &self,
        sender: &VaultAuth,
        receiver_public_key: &str,
    ) -> Result<(), AdapterError> {
        let count = self
            .wallet
            .message_track(sender, receiver_public_key)
            .await?
            .map_or(0, |t| t.count);
        self.wallet
            .add_message_tracking(sender, MessageTrack::new(receiver_public_key, count + 1))
            .await?;
        Ok(())
    }
}
