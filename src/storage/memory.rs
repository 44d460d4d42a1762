//! In-process stores.  Nothing survives the process; used by tests and
//! as the reference behaviour for the persistent stores.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, RowStore};
use crate::errors::{PassVaultError, Result};
use crate::vault::format::{KeyRecord, VaultRecord, VaultRow};

/// Sealed-layout store backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, VaultRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, identity: &str) -> Result<Option<VaultRecord>> {
        Ok(self.records.read().await.get(identity).cloned())
    }

    async fn insert(&self, identity: &str, record: &VaultRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(identity) {
            return Err(PassVaultError::StorageConflict(format!(
                "vault record for {identity} already exists"
            )));
        }
        records.insert(identity.to_string(), record.clone());
        Ok(())
    }

    async fn replace(&self, identity: &str, record: &VaultRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(identity) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(PassVaultError::VaultNotFound(identity.to_string())),
        }
    }
}

#[derive(Default)]
struct RowTables {
    keys: HashMap<String, KeyRecord>,
    rows: Vec<VaultRow>,
}

/// Row-layout store backed by a `Vec` (insertion order is row order).
#[derive(Default)]
pub struct MemoryRowStore {
    tables: RwLock<RowTables>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn get_key_record(&self, identity: &str) -> Result<Option<KeyRecord>> {
        Ok(self.tables.read().await.keys.get(identity).cloned())
    }

    async fn insert_key_record(&self, record: &KeyRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.keys.contains_key(&record.user_id) {
            return Err(PassVaultError::StorageConflict(format!(
                "key record for {} already exists",
                record.user_id
            )));
        }
        tables.keys.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn insert_row(&self, row: &VaultRow) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.rows.iter().any(|r| r.id == row.id) {
            return Err(PassVaultError::StorageConflict(format!(
                "row {} already exists",
                row.id
            )));
        }
        tables.rows.push(row.clone());
        Ok(())
    }

    async fn select_rows(&self, identity: &str) -> Result<Vec<VaultRow>> {
        Ok(self
            .tables
            .read()
            .await
            .rows
            .iter()
            .filter(|r| r.user_id == identity)
            .cloned()
            .collect())
    }

    async fn select_first_row(&self, identity: &str) -> Result<Option<VaultRow>> {
        Ok(self
            .tables
            .read()
            .await
            .rows
            .iter()
            .find(|r| r.user_id == identity)
            .cloned())
    }

    async fn delete_row(&self, identity: &str, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.rows.len();
        tables
            .rows
            .retain(|r| !(r.user_id == identity && r.id == id));
        Ok(tables.rows.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt, EncryptedBlob, VaultKey};
    use crate::vault::format::{UnlockParams, CURRENT_VERSION};
    use chrono::Utc;

    fn record() -> VaultRecord {
        let key = VaultKey::generate().unwrap();
        VaultRecord {
            version: CURRENT_VERSION,
            created_at: Utc::now(),
            unlock: UnlockParams::RandomKey { escrow: None },
            entries: encrypt(&key, b"[]").unwrap(),
        }
    }

    fn row(user: &str) -> VaultRow {
        VaultRow {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            key_id: Uuid::nil(),
            blob: EncryptedBlob::placeholder(),
            site_name: "site".into(),
            username: "user".into(),
        }
    }

    #[tokio::test]
    async fn insert_conflicts_and_replace_requires_existing() {
        let store = MemoryRecordStore::new();
        let rec = record();

        assert!(matches!(
            store.replace("alice", &rec).await,
            Err(PassVaultError::VaultNotFound(_))
        ));
        store.insert("alice", &rec).await.unwrap();
        assert!(matches!(
            store.insert("alice", &rec).await,
            Err(PassVaultError::StorageConflict(_))
        ));
        store.replace("alice", &rec).await.unwrap();
        assert_eq!(store.get("alice").await.unwrap(), Some(rec));
        assert_eq!(store.get("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rows_are_partitioned_and_ordered() {
        let store = MemoryRowStore::new();
        let a = row("alice");
        let b = row("bob");
        let c = row("alice");
        for r in [&a, &b, &c] {
            store.insert_row(r).await.unwrap();
        }

        let ids: Vec<Uuid> = store
            .select_rows("alice")
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(store.select_first_row("alice").await.unwrap().unwrap().id, a.id);

        assert!(matches!(
            store.insert_row(&a).await,
            Err(PassVaultError::StorageConflict(_))
        ));

        // Another identity cannot delete alice's row.
        assert!(!store.delete_row("bob", a.id).await.unwrap());
        assert!(store.delete_row("alice", a.id).await.unwrap());
        assert!(!store.delete_row("alice", a.id).await.unwrap());
    }
}
