//! Per-identity vault handles shared across tasks.
//!
//! Each identity gets one `VaultStore` behind a `tokio::sync::RwLock`.
//! Readers (`entries`, `search`) take the read lock and may overlap;
//! `unlock`, `add_entry`, `delete_entry` and `lock` take the write lock,
//! so mutations for one identity are serialized.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::store::{Backend, VaultStore};
use crate::errors::Result;

pub type SharedVault = Arc<RwLock<VaultStore>>;

/// Hands out one shared [`VaultStore`] per identity.
pub struct SessionManager {
    backend: Backend,
    vaults: Mutex<HashMap<String, SharedVault>>,
}

impl SessionManager {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            vaults: Mutex::new(HashMap::new()),
        }
    }

    /// The vault for `identity`, opening it on first use.
    pub async fn vault(&self, identity: &str) -> Result<SharedVault> {
        let mut vaults = self.vaults.lock().await;
        if let Some(vault) = vaults.get(identity) {
            return Ok(Arc::clone(vault));
        }

        let store = VaultStore::open(identity, self.backend.clone()).await?;
        let vault = Arc::new(RwLock::new(store));
        vaults.insert(identity.to_string(), Arc::clone(&vault));
        debug!(sessions = vaults.len(), "opened vault session");
        Ok(vault)
    }

    /// Lock every open vault, discarding all keys held in memory.
    pub async fn lock_all(&self) {
        let vaults = self.vaults.lock().await;
        for vault in vaults.values() {
            vault.write().await.lock();
        }
    }

    /// Lock and forget the vault for `identity`.
    pub async fn close(&self, identity: &str) {
        if let Some(vault) = self.vaults.lock().await.remove(identity) {
            vault.write().await.lock();
        }
    }
}
