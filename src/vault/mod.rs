//! Secret Store
//!
//! Versioned key-value secrets addressed by path. The wallet keeps its whole
//! document (transactions, message tracking, store keys) at
//! [`wallet_path`].
//!
//! The production backend lives outside this crate; [`InMemoryVault`] is the
//! reference implementation used by the binary and the test-suite.

pub mod memory;

pub use memory::InMemoryVault;
#[cfg(test)]
pub use memory::SlowVault;

use async_trait::async_trait;
use thiserror::Error;

use crate::secret::SecretString;

/// Secret-shaped payload: a JSON object
pub type SecretPayload = serde_json::Map<String, serde_json::Value>;

/// Deterministic path of a wallet document
pub fn wallet_path(identifier: &str) -> String {
    format!("wallets/{}/wallet", identifier)
}

/// Credentials presented on every store call
#[derive(Debug, Clone)]
pub struct VaultAuth {
    pub identifier: SecretString,
    pub password: SecretString,
}

impl VaultAuth {
    pub fn new(identifier: SecretString, password: SecretString) -> Self {
        Self {
            identifier,
            password,
        }
    }
}

/// A secret read back from the store
#[derive(Debug, Clone)]
pub struct VersionedSecret {
    pub version: u64,
    pub data: SecretPayload,
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Account already exists")]
    AccountExists,

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Malformed secret at {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Vault backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Register a named account protected by `credential`
    async fn create_account(
        &self,
        name: &SecretString,
        credential: &SecretString,
    ) -> Result<(), VaultError>;

    /// Read the latest version of the secret at `path`
    async fn read_secret(&self, auth: &VaultAuth, path: &str)
    -> Result<VersionedSecret, VaultError>;

    /// Write a new version of the secret at `path`, returning that version
    async fn write_secret(
        &self,
        auth: &VaultAuth,
        path: &str,
        data: SecretPayload,
    ) -> Result<u64, VaultError>;
}
