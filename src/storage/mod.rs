//! Persistence collaborators for vault data.
//!
//! The vault core never talks to a database or filesystem directly.  It
//! receives an explicitly constructed handle implementing one of two
//! traits:
//!
//! - [`RecordStore`]: keyed read/write of one [`VaultRecord`] per identity.
//! - [`RowStore`]: one [`KeyRecord`] per identity plus insert/select/delete
//!   of [`VaultRow`]s keyed by `(identity, row id)`.
//!
//! Identities are opaque partition keys; stores do not validate them.
//! Duplicate-key writes fail with `StorageConflict`, writes to a missing
//! record with `VaultNotFound`, transient outages with
//! `StorageUnavailable`.

pub mod file;
pub mod memory;
pub mod retry;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::vault::format::{KeyRecord, VaultRecord, VaultRow};

pub use file::FileRecordStore;
pub use memory::{MemoryRecordStore, MemoryRowStore};
pub use retry::{RetryPolicy, Retrying};
#[cfg(feature = "sqlite-store")]
pub use sqlite::SqliteRowStore;

/// Storage for the sealed layout.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record for `identity`, if any.
    async fn get(&self, identity: &str) -> Result<Option<VaultRecord>>;

    /// Create the record.  Fails with `StorageConflict` if one exists.
    async fn insert(&self, identity: &str, record: &VaultRecord) -> Result<()>;

    /// Atomically overwrite an existing record.  Fails with
    /// `VaultNotFound` if there is nothing to replace.
    async fn replace(&self, identity: &str, record: &VaultRecord) -> Result<()>;
}

/// Storage for the row layout.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Fetch the identity's key record, if any.
    async fn get_key_record(&self, identity: &str) -> Result<Option<KeyRecord>>;

    /// Create the key record.  Fails with `StorageConflict` if one exists.
    async fn insert_key_record(&self, record: &KeyRecord) -> Result<()>;

    /// Insert a row.  Fails with `StorageConflict` on a duplicate id.
    async fn insert_row(&self, row: &VaultRow) -> Result<()>;

    /// All rows for `identity` in insertion order.
    async fn select_rows(&self, identity: &str) -> Result<Vec<VaultRow>>;

    /// Any one row for `identity` (the oldest).
    async fn select_first_row(&self, identity: &str) -> Result<Option<VaultRow>>;

    /// Delete a row.  Returns `false` if no such row existed.
    async fn delete_row(&self, identity: &str, id: Uuid) -> Result<bool>;
}
