//! SQLite row store.
//!
//! Wraps a `rusqlite::Connection` behind an `Arc<Mutex<>>` and runs every
//! query on the blocking thread pool via `tokio::task::spawn_blocking`.
//!
//! Schema:
//!
//! ```text
//! vault_keys(user_id PK, record JSON)
//! vault_rows(seq PK AUTOINCREMENT, id UNIQUE, user_id, key_id,
//!            iv, ciphertext, site_name, username)
//! ```
//!
//! `seq` gives rows a stable insertion order.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use super::RowStore;
use crate::crypto::EncryptedBlob;
use crate::errors::{PassVaultError, Result};
use crate::vault::format::{KeyRecord, VaultRow};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vault_keys (
    user_id TEXT PRIMARY KEY,
    record  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS vault_rows (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    id         TEXT NOT NULL UNIQUE,
    user_id    TEXT NOT NULL,
    key_id     TEXT NOT NULL,
    iv         BLOB NOT NULL,
    ciphertext BLOB NOT NULL,
    site_name  TEXT NOT NULL,
    username   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_vault_rows_user ON vault_rows (user_id, seq);
";

const ROW_COLUMNS: &str = "id, user_id, key_id, iv, ciphertext, site_name, username";

/// Row-layout store backed by SQLite.
#[derive(Clone)]
pub struct SqliteRowStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRowStore {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// Blocks briefly on file I/O; call it during startup.
    pub fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "opening row store");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(sql_error)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }

        Self::from_connection(conn)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        debug!("opening in-memory row store");
        Self::from_connection(Connection::open_in_memory().map_err(sql_error)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(sql_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| PassVaultError::StorageUnavailable(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await
        .map_err(|e| PassVaultError::StorageUnavailable(format!("task join: {e}")))?
    }
}

/// Map a SQLite error: constraint violations are conflicts, everything
/// else is the store being unavailable.
fn sql_error(e: rusqlite::Error) -> PassVaultError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            PassVaultError::StorageConflict(e.to_string())
        }
        _ => PassVaultError::StorageUnavailable(format!("sqlite: {e}")),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| PassVaultError::IntegrityError(format!("bad row id '{s}': {e}")))
}

/// Raw column values, converted outside the rusqlite row callback so
/// parse failures surface as integrity errors.
struct RawRow {
    id: String,
    user_id: String,
    key_id: String,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    site_name: String,
    username: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            key_id: row.get(2)?,
            iv: row.get(3)?,
            ciphertext: row.get(4)?,
            site_name: row.get(5)?,
            username: row.get(6)?,
        })
    }

    fn into_row(self) -> Result<VaultRow> {
        Ok(VaultRow {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id,
            key_id: parse_uuid(&self.key_id)?,
            blob: EncryptedBlob {
                iv: self.iv,
                ciphertext: self.ciphertext,
            },
            site_name: self.site_name,
            username: self.username,
        })
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn get_key_record(&self, identity: &str) -> Result<Option<KeyRecord>> {
        let identity = identity.to_string();
        let json: Option<String> = self
            .execute(move |conn| {
                conn.query_row(
                    "SELECT record FROM vault_keys WHERE user_id = ?1",
                    params![identity],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error)
            })
            .await?;

        json.map(|j| {
            serde_json::from_str(&j)
                .map_err(|e| PassVaultError::IntegrityError(format!("key record JSON: {e}")))
        })
        .transpose()
    }

    async fn insert_key_record(&self, record: &KeyRecord) -> Result<()> {
        let user_id = record.user_id.clone();
        let json = serde_json::to_string(record)
            .map_err(|e| PassVaultError::SerializationError(format!("key record: {e}")))?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO vault_keys (user_id, record) VALUES (?1, ?2)",
                params![user_id, json],
            )
            .map_err(sql_error)?;
            Ok(())
        })
        .await
    }

    async fn insert_row(&self, row: &VaultRow) -> Result<()> {
        let row = row.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO vault_rows (id, user_id, key_id, iv, ciphertext, site_name, username)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id.to_string(),
                    row.user_id,
                    row.key_id.to_string(),
                    row.blob.iv,
                    row.blob.ciphertext,
                    row.site_name,
                    row.username,
                ],
            )
            .map_err(sql_error)?;
            Ok(())
        })
        .await
    }

    async fn select_rows(&self, identity: &str) -> Result<Vec<VaultRow>> {
        let identity = identity.to_string();
        let raw: Vec<RawRow> = self
            .execute(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {ROW_COLUMNS} FROM vault_rows WHERE user_id = ?1 ORDER BY seq"
                    ))
                    .map_err(sql_error)?;
                let rows = stmt
                    .query_map(params![identity], RawRow::from_row)
                    .map_err(sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_error)
            })
            .await?;

        raw.into_iter().map(RawRow::into_row).collect()
    }

    async fn select_first_row(&self, identity: &str) -> Result<Option<VaultRow>> {
        let identity = identity.to_string();
        let raw: Option<RawRow> = self
            .execute(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {ROW_COLUMNS} FROM vault_rows WHERE user_id = ?1 ORDER BY seq LIMIT 1"
                    ),
                    params![identity],
                    RawRow::from_row,
                )
                .optional()
                .map_err(sql_error)
            })
            .await?;

        raw.map(RawRow::into_row).transpose()
    }

    async fn delete_row(&self, identity: &str, id: Uuid) -> Result<bool> {
        let identity = identity.to_string();
        let deleted = self
            .execute(move |conn| {
                conn.execute(
                    "DELETE FROM vault_rows WHERE user_id = ?1 AND id = ?2",
                    params![identity, id.to_string()],
                )
                .map_err(sql_error)
            })
            .await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt, VaultKey};
    use crate::vault::format::{UnlockParams, CURRENT_VERSION};
    use chrono::Utc;
    use tempfile::TempDir;

    fn key_record(user: &str) -> KeyRecord {
        let key = VaultKey::generate().unwrap();
        KeyRecord {
            version: CURRENT_VERSION,
            user_id: user.to_string(),
            key_id: Uuid::new_v4(),
            created_at: Utc::now(),
            unlock: UnlockParams::RandomKey { escrow: None },
            key_check: encrypt(&key, b"check").unwrap(),
        }
    }

    fn row(user: &str, site: &str) -> VaultRow {
        let key = VaultKey::generate().unwrap();
        VaultRow {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            key_id: Uuid::new_v4(),
            blob: encrypt(&key, b"secret").unwrap(),
            site_name: site.to_string(),
            username: "user".into(),
        }
    }

    #[tokio::test]
    async fn key_record_roundtrip_and_conflict() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        assert!(store.get_key_record("alice").await.unwrap().is_none());

        let rec = key_record("alice");
        store.insert_key_record(&rec).await.unwrap();
        assert_eq!(store.get_key_record("alice").await.unwrap(), Some(rec.clone()));

        assert!(matches!(
            store.insert_key_record(&rec).await,
            Err(PassVaultError::StorageConflict(_))
        ));
    }

    #[tokio::test]
    async fn rows_keep_insertion_order() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        let a = row("alice", "a");
        let b = row("alice", "b");
        let other = row("bob", "x");
        store.insert_row(&a).await.unwrap();
        store.insert_row(&other).await.unwrap();
        store.insert_row(&b).await.unwrap();

        let rows = store.select_rows("alice").await.unwrap();
        assert_eq!(rows, vec![a.clone(), b]);
        assert_eq!(store.select_first_row("alice").await.unwrap(), Some(a.clone()));

        assert!(matches!(
            store.insert_row(&a).await,
            Err(PassVaultError::StorageConflict(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_scoped_to_identity() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        let a = row("alice", "a");
        store.insert_row(&a).await.unwrap();

        assert!(!store.delete_row("bob", a.id).await.unwrap());
        assert!(store.delete_row("alice", a.id).await.unwrap());
        assert!(!store.delete_row("alice", a.id).await.unwrap());
        assert!(store.select_first_row("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.db");

        let a = row("alice", "a");
        {
            let store = SqliteRowStore::open(&path).unwrap();
            store.insert_key_record(&key_record("alice")).await.unwrap();
            store.insert_row(&a).await.unwrap();
        }

        let store = SqliteRowStore::open(&path).unwrap();
        assert!(store.get_key_record("alice").await.unwrap().is_some());
        assert_eq!(store.select_rows("alice").await.unwrap(), vec![a]);
    }
}
