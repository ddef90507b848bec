//! Wallet Service
//!
//! Reads and writes the wallet document held in the secret store. Every
//! mutation is a read-modify-write of the whole document, serialized per
//! wallet so concurrent transfers on one wallet never lose an update.
//! Versions are assigned and balances re-checked under the same lock.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use rustc_hash::FxHasher;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::change::{calculate_change, calculate_change_for_stamp, select_coins};
use super::types::{
    BurnOutcome, MessageTrack, SpentCoin, TransactionChange, TransactionKind, TransactionRecord,
};
use crate::crypto::{self, CryptoError};
use crate::secret::SecretString;
use crate::vault::{SecretPayload, SecretStore, VaultAuth, VaultError, wallet_path};

const TRANSACTIONS_KEY: &str = "transactions";
const MESSAGES_KEY: &str = "messages";
const STORE_KEYS_KEY: &str = "storeKeys";
const SPENT_KEY: &str = "spent";

pub const PUBLIC_KEY: &str = "publicKey";
pub const SECRET_KEY: &str = "secretKey";
pub const ADDRESS: &str = "address";

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Malformed wallet document: {0}")]
    Malformed(String),

    #[error("Store key not found: {0}")]
    StoreKeyMissing(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Insufficient funds: {available} available, {requested} requested")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
}

/// Hash of the change record written by the burn `hash`
pub fn change_hash(hash: &str) -> String {
    format!("{}-change", hash)
}

pub struct WalletService {
    vault: Arc<dyn SecretStore>,
    /// Keyed by a hash of the wallet identifier; a collision only makes two
    /// wallets share a lock
    write_locks: DashMap<u64, Arc<Mutex<()>>>,
}

/// Held while a wallet document is rewritten; drops its map entry once no
/// other writer is waiting
struct WalletLock<'a> {
    locks: &'a DashMap<u64, Arc<Mutex<()>>>,
    key: u64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for WalletLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl WalletService {
    pub fn new(vault: Arc<dyn SecretStore>) -> Self {
        Self {
            vault,
            write_locks: DashMap::new(),
        }
    }

    /// Create a vault account and an empty wallet document with a fresh key set
    pub async fn create_wallet(&self) -> Result<VaultAuth, WalletError> {
        let identifier = crypto::new_id(32);
        let password = crypto::new_id(24);
        self.vault.create_account(&identifier, &password).await?;

        let keys = crypto::key_pair();
        let mut store_keys = serde_json::Map::new();
        store_keys.insert(PUBLIC_KEY.into(), Value::String(keys.public_key.clone()));
        store_keys.insert(ADDRESS.into(), Value::String(keys.address.clone()));
        keys.secret_key.expose(|sk| {
            store_keys.insert(SECRET_KEY.into(), Value::String(sk.to_string()));
        });

        let mut doc = SecretPayload::new();
        doc.insert(TRANSACTIONS_KEY.into(), Value::Array(Vec::new()));
        doc.insert(MESSAGES_KEY.into(), Value::Array(Vec::new()));
        doc.insert(STORE_KEYS_KEY.into(), Value::Object(store_keys));

        let auth = VaultAuth::new(identifier, password);
        self.write_document(&auth, doc).await?;

        info!(public_key = %keys.public_key, "Wallet created");
        Ok(auth)
    }

    pub async fn transactions(
        &self,
        auth: &VaultAuth,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        let doc = self.read_document(auth).await?;
        list_field(&doc, TRANSACTIONS_KEY)
    }

    pub async fn transactions_by_stamp(
        &self,
        auth: &VaultAuth,
        stamp: &str,
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        let mut txs = self.transactions(auth).await?;
        txs.retain(|tx| tx.stamp == stamp);
        Ok(txs)
    }

    pub async fn transaction(
        &self,
        auth: &VaultAuth,
        hash: &str,
    ) -> Result<Option<TransactionRecord>, WalletError> {
        if hash.is_empty() {
            return Err(WalletError::InvalidArgument("hash is missing"));
        }
        let txs = self.transactions(auth).await?;
        Ok(txs.into_iter().find(|tx| tx.hash == hash))
    }

    /// Highest-version record of the given kind
    pub async fn last_transaction(
        &self,
        auth: &VaultAuth,
        kind: TransactionKind,
    ) -> Result<Option<TransactionRecord>, WalletError> {
        let txs = self.transactions(auth).await?;
        Ok(txs
            .into_iter()
            .filter(|tx| tx.kind == kind)
            .max_by_key(|tx| tx.version))
    }

    /// Append a record unless its hash is already present
    ///
    /// Returns `false` for a duplicate. The record keeps the version it was
    /// built with; use [`WalletService::deposit`] to have one assigned.
    pub async fn add_transaction(
        &self,
        auth: &VaultAuth,
        record: TransactionRecord,
    ) -> Result<bool, WalletError> {
        self.append(auth, record, false).await
    }

    /// Append a Receive record at the next free version
    pub async fn deposit(
        &self,
        auth: &VaultAuth,
        amount: Decimal,
        stamp: &str,
        hash: &str,
    ) -> Result<bool, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidArgument("deposit must be positive"));
        }
        let record = TransactionRecord::new(amount, TransactionKind::Receive, 0, stamp, hash);
        self.append(auth, record, true).await
    }

    async fn append(
        &self,
        auth: &VaultAuth,
        mut record: TransactionRecord,
        assign_version: bool,
    ) -> Result<bool, WalletError> {
        if record.hash.is_empty() {
            return Err(WalletError::InvalidArgument("hash is missing"));
        }
        let _lock = self.write_lock(auth).await;

        let mut doc = self.read_document(auth).await?;
        let mut txs: Vec<TransactionRecord> = list_field(&doc, TRANSACTIONS_KEY)?;

        if txs.iter().any(|tx| tx.hash == record.hash) {
            debug!(hash = %record.hash, "Transaction already recorded");
            return Ok(false);
        }
        if assign_version {
            record.version = next_version(&txs);
        }

        debug!(hash = %record.hash, amount = %record.amount, kind = %record.kind, version = record.version, "Recording transaction");
        txs.push(record);
        set_list_field(&mut doc, TRANSACTIONS_KEY, &txs)?;
        self.write_document(auth, doc).await?;
        Ok(true)
    }

    /// Spend unspent coins worth `amount` in one locked read-modify-write
    ///
    /// Records carrying `stamp` neither count towards the balance check nor
    /// serve as coins. The selected coins are marked spent against `hash`, a
    /// Send record `hash` is appended for their total and any overshoot comes
    /// back as a Receive record under [`change_hash`]. Burning a `hash` that
    /// is already recorded returns the original outcome.
    pub async fn burn(
        &self,
        auth: &VaultAuth,
        stamp: &str,
        hash: &str,
        amount: Decimal,
    ) -> Result<BurnOutcome, WalletError> {
        if stamp.is_empty() {
            return Err(WalletError::InvalidArgument("stamp is missing"));
        }
        if hash.is_empty() {
            return Err(WalletError::InvalidArgument("hash is missing"));
        }
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidArgument("burn amount must be positive"));
        }
        let _lock = self.write_lock(auth).await;

        let mut doc = self.read_document(auth).await?;
        let mut txs: Vec<TransactionRecord> = list_field(&doc, TRANSACTIONS_KEY)?;
        let mut spent: Vec<SpentCoin> = list_field(&doc, SPENT_KEY)?;
        let change_id = change_hash(hash);

        if txs.iter().any(|tx| tx.hash == hash) {
            debug!(hash, "Burn already recorded");
            return Ok(BurnOutcome {
                coins: spent
                    .iter()
                    .filter(|s| s.burn == hash)
                    .map(|s| s.coin.clone())
                    .collect(),
                change: txs
                    .iter()
                    .find(|tx| tx.hash == change_id)
                    .map_or(Decimal::ZERO, |tx| tx.amount),
                written: false,
            });
        }

        let available: Decimal = txs
            .iter()
            .filter(|tx| tx.stamp != stamp)
            .map(|tx| tx.amount)
            .sum();
        if available < amount {
            return Err(WalletError::InsufficientFunds {
                available,
                requested: amount,
            });
        }

        let selection = {
            let used: HashSet<&str> = spent.iter().map(|s| s.coin.as_str()).collect();
            let coins: Vec<TransactionRecord> = txs
                .iter()
                .filter(|tx| tx.stamp != stamp && !used.contains(tx.hash.as_str()))
                .cloned()
                .collect();
            select_coins(amount, &coins)
        };
        if selection.residual > Decimal::ZERO {
            return Err(WalletError::InsufficientFunds {
                available: selection.selected_total(),
                requested: amount,
            });
        }

        let total = selection.selected_total();
        let change = -selection.residual;
        let version = next_version(&txs);
        txs.push(TransactionRecord::new(
            -total,
            TransactionKind::Send,
            version,
            stamp,
            hash,
        ));
        if !change.is_zero() {
            txs.push(TransactionRecord::new(
                change,
                TransactionKind::Receive,
                version + 1,
                stamp,
                change_id,
            ));
        }

        let coins: Vec<String> = selection.transactions.into_iter().map(|c| c.hash).collect();
        spent.extend(coins.iter().map(|coin| SpentCoin {
            coin: coin.clone(),
            burn: hash.to_string(),
        }));

        set_list_field(&mut doc, TRANSACTIONS_KEY, &txs)?;
        set_list_field(&mut doc, SPENT_KEY, &spent)?;
        self.write_document(auth, doc).await?;

        info!(hash, %amount, coins = coins.len(), %change, "Coins burned");
        Ok(BurnOutcome {
            coins,
            change,
            written: true,
        })
    }

    /// Hashes of coins already consumed by a burn
    pub async fn spent_coins(&self, auth: &VaultAuth) -> Result<Vec<SpentCoin>, WalletError> {
        let doc = self.read_document(auth).await?;
        list_field(&doc, SPENT_KEY)
    }

    /// Signed sum of every record
    pub async fn available_balance(&self, auth: &VaultAuth) -> Result<Decimal, WalletError> {
        let txs = self.transactions(auth).await?;
        Ok(txs.iter().map(|tx| tx.amount).sum())
    }

    pub async fn total_transaction_amount(
        &self,
        auth: &VaultAuth,
        stamp: &str,
    ) -> Result<Decimal, WalletError> {
        if stamp.is_empty() {
            return Err(WalletError::InvalidArgument("stamp is missing"));
        }
        let txs = self.transactions_by_stamp(auth, stamp).await?;
        Ok(txs.iter().map(|tx| tx.amount).sum())
    }

    /// Insert or replace the tracking entry for `track.public_key`
    pub async fn add_message_tracking(
        &self,
        auth: &VaultAuth,
        track: MessageTrack,
    ) -> Result<(), WalletError> {
        let _lock = self.write_lock(auth).await;

        let mut doc = self.read_document(auth).await?;
        let mut tracks: Vec<MessageTrack> = list_field(&doc, MESSAGES_KEY)?;

        match tracks.iter_mut().find(|t| t.public_key == track.public_key) {
            Some(existing) => *existing = track,
            None => tracks.push(track),
        }

        set_list_field(&mut doc, MESSAGES_KEY, &tracks)?;
        self.write_document(auth, doc).await?;
        Ok(())
    }

    pub async fn message_track(
        &self,
        auth: &VaultAuth,
        public_key: &str,
    ) -> Result<Option<MessageTrack>, WalletError> {
        let doc = self.read_document(auth).await?;
        let tracks: Vec<MessageTrack> = list_field(&doc, MESSAGES_KEY)?;
        Ok(tracks.into_iter().find(|t| t.public_key == public_key))
    }

    /// Read one entry of the wallet's `storeKeys` section
    pub async fn store_key(&self, auth: &VaultAuth, name: &str) -> Result<SecretString, WalletError> {
        if name.is_empty() {
            return Err(WalletError::InvalidArgument("store key is missing"));
        }
        let doc = self.read_document(auth).await?;
        doc.get(STORE_KEYS_KEY)
            .and_then(|keys| keys.get(name))
            .and_then(Value::as_str)
            .map(SecretString::from)
            .ok_or_else(|| WalletError::StoreKeyMissing(name.to_string()))
    }

    pub async fn make_change(
        &self,
        auth: &VaultAuth,
        amount: Decimal,
    ) -> Result<TransactionChange, WalletError> {
        let txs = self.transactions(auth).await?;
        Ok(calculate_change(amount, &txs))
    }

    pub async fn make_change_for_stamp(
        &self,
        auth: &VaultAuth,
        amount: Decimal,
        stamp: &str,
    ) -> Result<TransactionChange, WalletError> {
        if stamp.is_empty() {
            return Err(WalletError::InvalidArgument("stamp is missing"));
        }
        let txs = self.transactions(auth).await?;
        Ok(calculate_change_for_stamp(amount, stamp, &txs))
    }

    async fn write_lock(&self, auth: &VaultAuth) -> WalletLock<'_> {
        let key = auth.identifier.expose(|id| {
            let mut hasher = FxHasher::default();
            id.hash(&mut hasher);
            hasher.finish()
        });
        let lock = self.write_locks.entry(key).or_default().clone();
        let mut held = WalletLock {
            locks: &self.write_locks,
            key,
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    async fn read_document(&self, auth: &VaultAuth) -> Result<SecretPayload, WalletError> {
        let path = auth.identifier.expose(wallet_path);
        Ok(self.vault.read_secret(auth, &path).await?.data)
    }

    async fn write_document(&self, auth: &VaultAuth, doc: SecretPayload) -> Result<(), WalletError> {
        let path = auth.identifier.expose(wallet_path);
        self.vault.write_secret(auth, &path, doc).await?;
        Ok(())
    }
}

fn next_version(txs: &[TransactionRecord]) -> u64 {
    txs.iter().map(|tx| tx.version).max().map_or(1, |v| v + 1)
}

fn list_field<T: DeserializeOwned>(doc: &SecretPayload, key: &str) -> Result<Vec<T>, WalletError> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| WalletError::Malformed(format!("{}: {}", key, e))),
    }
}

fn set_list_field<T: Serialize>(
    doc: &mut SecretPayload,
    key: &str,
    items: &[T],
) -> Result<(), WalletError> {
    let value =
        serde_json::to_value(items).map_err(|e| WalletError::Malformed(format!("{}: {}", key, e)))?;
    doc.insert(key.to_string(), value);
    Ok(())
}
