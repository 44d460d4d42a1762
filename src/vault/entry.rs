//! Credential entries stored inside a vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::errors::{PassVaultError, Result};

/// A single decrypted credential.
///
/// `id` and `created_at` are assigned once when the entry is added and
/// never change.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    pub id: Uuid,
    pub site_name: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

impl VaultEntry {
    /// Case-insensitive match on site name or username.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.site_name.to_lowercase().contains(&query)
            || self.username.to_lowercase().contains(&query)
    }
}

impl Drop for VaultEntry {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl std::fmt::Debug for VaultEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultEntry")
            .field("id", &self.id)
            .field("site_name", &self.site_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// The user-supplied fields of an entry that has not been stored yet.
#[derive(Clone)]
pub struct NewEntry {
    pub site_name: String,
    pub username: String,
    pub password: String,
}

impl NewEntry {
    pub fn new(
        site_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// All three fields are required.
    pub fn validate(&self) -> Result<()> {
        if self.site_name.trim().is_empty() {
            return Err(PassVaultError::MissingField("site name"));
        }
        if self.username.trim().is_empty() {
            return Err(PassVaultError::MissingField("username"));
        }
        if self.password.is_empty() {
            return Err(PassVaultError::MissingField("password"));
        }
        Ok(())
    }

    /// Stamp a fresh id and creation time onto the entry.
    pub fn into_entry(self) -> VaultEntry {
        VaultEntry {
            id: Uuid::new_v4(),
            site_name: self.site_name.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            created_at: Utc::now(),
        }
    }
}

impl Drop for NewEntry {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}
