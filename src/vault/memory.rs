//! In-memory secret store
//!
//! Accounts hold an argon2 hash of their credential. Secrets are scoped to the
//! account that wrote them and keep every version.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{SecretPayload, SecretStore, VaultAuth, VaultError, VersionedSecret};
use crate::crypto;
use crate::secret::SecretString;

#[derive(Default)]
struct VaultState {
    /// account name -> PHC hash
    accounts: FxHashMap<String, String>,
    /// (account, path) -> versions, oldest first
    secrets: FxHashMap<(String, String), Vec<SecretPayload>>,
    /// credentials that already passed an argon2 check
    verified: FxHashMap<String, SecretString>,
}

#[derive(Default)]
pub struct InMemoryVault {
    state: RwLock<VaultState>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of versions written at `path` for the authenticated account
    pub async fn version_count(&self, auth: &VaultAuth, path: &str) -> Result<usize, VaultError> {
        let account = self.authenticate(auth).await?;
        let state = self.state.read().await;
        Ok(state
            .secrets
            .get(&(account, path.to_string()))
            .map_or(0, Vec::len))
    }

    async fn authenticate(&self, auth: &VaultAuth) -> Result<String, VaultError> {
        let account = auth.identifier.expose(str::to_string);
        let phc = {
            let state = self.state.read().await;
            let phc = state
                .accounts
                .get(&account)
                .cloned()
                .ok_or(VaultError::Unauthorized)?;

            let cached = state.verified.get(&account).is_some_and(|known| {
                known.expose(|k| auth.password.expose(|p| k == p))
            });
            if cached {
                return Ok(account);
            }
            phc
        };

        let ok = crypto::verify_password(&auth.password, &phc)
            .map_err(|e| VaultError::Backend(e.to_string()))?;
        if !ok {
            return Err(VaultError::Unauthorized);
        }

        self.state
            .write()
            .await
            .verified
            .insert(account.clone(), auth.password.clone());
        Ok(account)
    }
}

#[async_trait]
impl SecretStore for InMemoryVault {
    async fn create_account(
        &self,
        name: &SecretString,
        credential: &SecretString,
    ) -> Result<(), VaultError> {
        let phc = crypto::hash_password(credential).map_err(|e| VaultError::Backend(e.to_string()))?;
        let account = name.expose(str::to_string);

        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account) {
            return Err(VaultError::AccountExists);
        }
        state.accounts.insert(account, phc);
        debug!("Vault account created");
        Ok(())
    }

    async fn read_secret(
        &self,
        auth: &VaultAuth,
        path: &str,
    ) -> Result<VersionedSecret, VaultError> {
        let account = self.authenticate(auth).await?;
        let state = self.state.read().await;

        let versions = state
            .secrets
            .get(&(account, path.to_string()))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| VaultError::NotFound(path.to_string()))?;

        Ok(VersionedSecret {
            version: versions.len() as u64,
            data: versions[versions.len() - 1].clone(),
        })
    }

    async fn write_secret(
        &self,
        auth: &VaultAuth,
        path: &str,
        data: SecretPayload,
    ) -> Result<u64, VaultError> {
        let account = self.authenticate(auth).await?;
        let mut state = self.state.write().await;

        let versions = state
            .secrets
            .entry((account, path.to_string()))
            .or_default();
        versions.push(data);

        debug!(path = path, version = versions.len(), "Secret written");
        Ok(versions.len() as u64)
    }
}

/// In-memory store whose reads take a while, for interleaving tests
#[cfg(test)]
pub struct SlowVault {
    inner: InMemoryVault,
    read_delay: std::time::Duration,
}

#[cfg(test)]
impl SlowVault {
    pub fn new(read_delay: std::time::Duration) -> Self {
        Self {
            inner: InMemoryVault::new(),
            read_delay,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl SecretStore for SlowVault {
    async fn create_account(
        &self,
        name: &SecretString,
        credential: &SecretString,
    ) -> Result<(), VaultError> {
        self.inner.create_account(name, credential).await
    }

    async fn read_secret(
        &self,
        auth: &VaultAuth,
        path: &str,
    ) -> Result<VersionedSecret, VaultError> {
        tokio::time::sleep(self.read_delay).await;
        self.inner.read_secret(auth, path).await
    }

    async fn write_secret(
        &self,
        auth: &VaultAuth,
        path: &str,
        data: SecretPayload,
    ) -> Result<u64, VaultError> {
        self.inner.write_secret(auth, path, data).await
    }
}
