//! Local-filesystem record store.
//!
//! Each identity's `VaultRecord` is a JSON file in the vault directory:
//!
//! ```text
//! <vault_dir>/<hex(sha256(identity))>.vault
//! ```
//!
//! Hashing the identity keeps arbitrary identity strings out of file
//! paths.  Every write goes to its own temp file in the same directory
//! first, so readers never see a half-written record.  Creation is
//! `persist_noclobber`: of several racing inserts exactly one lands.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

use super::RecordStore;
use crate::errors::{PassVaultError, Result};
use crate::vault::format::VaultRecord;

/// Sealed-layout store writing one file per identity.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    /// Use `dir` as the vault directory.  It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `identity`.
    pub fn record_path(&self, identity: &str) -> PathBuf {
        let digest = Sha256::digest(identity.as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{name}.vault"))
    }

    /// Serialize `record` into a fresh temp file beside the record and
    /// hand it to `publish` on the blocking pool.
    ///
    /// Each write gets its own uniquely named temp file, so concurrent
    /// writers never share one.
    async fn write_with<F>(&self, record: &VaultRecord, publish: F) -> Result<()>
    where
        F: FnOnce(NamedTempFile) -> Result<()> + Send + 'static,
    {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| PassVaultError::SerializationError(format!("record: {e}")))?;
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(unavailable)?;
            // NamedTempFile is created 0600 on unix.
            let mut tmp = tempfile::Builder::new()
                .prefix(".")
                .suffix(".vault.tmp")
                .tempfile_in(&dir)
                .map_err(unavailable)?;
            tmp.write_all(&bytes).map_err(unavailable)?;
            tmp.as_file().sync_all().map_err(unavailable)?;
            publish(tmp)
        })
        .await
        .map_err(|e| PassVaultError::StorageUnavailable(format!("task join: {e}")))?
    }
}

fn unavailable(e: std::io::Error) -> PassVaultError {
    PassVaultError::StorageUnavailable(format!("vault file: {e}"))
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, identity: &str) -> Result<Option<VaultRecord>> {
        let path = self.record_path(identity);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(e)),
        };

        debug!(path = %path.display(), bytes = data.len(), "read vault record");
        let record = serde_json::from_slice(&data)
            .map_err(|e| PassVaultError::IntegrityError(format!("vault record JSON: {e}")))?;
        Ok(Some(record))
    }

    async fn insert(&self, identity: &str, record: &VaultRecord) -> Result<()> {
        let path = self.record_path(identity);
        let target = path.clone();

        self.write_with(record, move |tmp| match tmp.persist_noclobber(&target) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(PassVaultError::StorageConflict(format!(
                    "vault record already exists at {}",
                    target.display()
                )))
            }
            Err(e) => Err(unavailable(e.error)),
        })
        .await?;

        debug!(path = %path.display(), "created vault record");
        Ok(())
    }

    async fn replace(&self, identity: &str, record: &VaultRecord) -> Result<()> {
        let path = self.record_path(identity);
        if !fs::try_exists(&path).await.map_err(unavailable)? {
            return Err(PassVaultError::VaultNotFound(identity.to_string()));
        }

        let target = path.clone();
        self.write_with(record, move |tmp| {
            tmp.persist(&target).map(|_| ()).map_err(|e| unavailable(e.error))
        })
        .await?;

        debug!(path = %path.display(), "replaced vault record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt, VaultKey};
    use crate::vault::format::{UnlockParams, CURRENT_VERSION};
    use chrono::Utc;
    use tempfile::TempDir;

    fn record() -> VaultRecord {
        let key = VaultKey::generate().unwrap();
        VaultRecord {
            version: CURRENT_VERSION,
            created_at: Utc::now(),
            unlock: UnlockParams::RandomKey { escrow: None },
            entries: encrypt(&key, b"[]").unwrap(),
        }
    }

    #[tokio::test]
    async fn insert_get_replace_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path().join("vaults"));

        assert!(store.get("alice").await.unwrap().is_none());

        let first = record();
        store.insert("alice", &first).await.unwrap();
        assert_eq!(store.get("alice").await.unwrap(), Some(first));

        let second = record();
        store.replace("alice", &second).await.unwrap();
        assert_eq!(store.get("alice").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path());
        store.insert("alice", &record()).await.unwrap();

        assert!(matches!(
            store.insert("alice", &record()).await,
            Err(PassVaultError::StorageConflict(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_inserts_land_exactly_one_record() {
        for _ in 0..20 {
            let dir = TempDir::new().unwrap();
            let store = std::sync::Arc::new(FileRecordStore::new(dir.path()));
            let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(4));

            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    tokio::spawn(async move {
                        let mine = record();
                        barrier.wait().await;
                        store.insert("alice", &mine).await.map(|()| mine)
                    })
                })
                .collect();

            let mut winners = Vec::new();
            for task in tasks {
                match task.await.unwrap() {
                    Ok(mine) => winners.push(mine),
                    Err(PassVaultError::StorageConflict(_)) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            assert_eq!(winners.len(), 1);
            assert_eq!(store.get("alice").await.unwrap().as_ref(), winners.first());
        }
    }

    #[tokio::test]
    async fn replace_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path());
        assert!(matches!(
            store.replace("ghost", &record()).await,
            Err(PassVaultError::VaultNotFound(_))
        ));
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path());
        store.insert("alice", &record()).await.unwrap();
        store.replace("alice", &record()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".vault"));
    }

    #[tokio::test]
    async fn garbage_file_is_an_integrity_error() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path());
        std::fs::write(store.record_path("alice"), b"not json").unwrap();

        assert!(matches!(
            store.get("alice").await,
            Err(PassVaultError::IntegrityError(_))
        ));
    }

    #[test]
    fn identity_never_appears_in_path() {
        let store = FileRecordStore::new("/tmp/v");
        let path = store.record_path("../../etc/passwd");
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/v"));
        assert!(!path.to_string_lossy().contains("passwd"));
    }
}
