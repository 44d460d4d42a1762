//! Bounded retry at the storage boundary.
//!
//! `Retrying<S>` wraps any store and re-issues calls that failed with
//! `StorageUnavailable`, a fixed number of times with a fixed delay.
//! Conflicts, missing records and integrity failures are returned on
//! the first attempt: retrying them cannot succeed.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use super::{RecordStore, RowStore};
use crate::errors::Result;
use crate::vault::format::{KeyRecord, VaultRecord, VaultRow};

/// Fixed-count, fixed-backoff retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.  Zero is treated as one.
    pub attempts: u32,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(op, attempt, attempts, error = %e, "storage call failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// A store wrapper applying a [`RetryPolicy`] to every call.
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for Retrying<S> {
    async fn get(&self, identity: &str) -> Result<Option<VaultRecord>> {
        self.policy.run("get", || self.inner.get(identity)).await
    }

    async fn insert(&self, identity: &str, record: &VaultRecord) -> Result<()> {
        self.policy
            .run("insert", || self.inner.insert(identity, record))
            .await
    }

    async fn replace(&self, identity: &str, record: &VaultRecord) -> Result<()> {
        self.policy
            .run("replace", || self.inner.replace(identity, record))
            .await
    }
}

#[async_trait]
impl<S: RowStore> RowStore for Retrying<S> {
    async fn get_key_record(&self, identity: &str) -> Result<Option<KeyRecord>> {
        self.policy
            .run("get_key_record", || self.inner.get_key_record(identity))
            .await
    }

    async fn insert_key_record(&self, record: &KeyRecord) -> Result<()> {
        self.policy
            .run("insert_key_record", || self.inner.insert_key_record(record))
            .await
    }

    async fn insert_row(&self, row: &VaultRow) -> Result<()> {
        self.policy
            .run("insert_row", || self.inner.insert_row(row))
            .await
    }

    async fn select_rows(&self, identity: &str) -> Result<Vec<VaultRow>> {
        self.policy
            .run("select_rows", || self.inner.select_rows(identity))
            .await
    }

    async fn select_first_row(&self, identity: &str) -> Result<Option<VaultRow>> {
        self.policy
            .run("select_first_row", || self.inner.select_first_row(identity))
            .await
    }

    async fn delete_row(&self, identity: &str, id: Uuid) -> Result<bool> {
        self.policy
            .run("delete_row", || self.inner.delete_row(identity, id))
            .await
    }
}
