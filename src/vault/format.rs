//! Persisted vault records.
//!
//! Two layouts exist:
//!
//! - **Sealed** (`VaultRecord`): one record per identity holding the
//!   whole entry list as a single encrypted blob.  Every mutation
//!   re-encrypts the full list.
//! - **Rows** (`KeyRecord` + `VaultRow`): one key record per identity and
//!   one row per entry.  Site name and username are stored in plaintext,
//!   the password and creation time are encrypted per row.
//!
//! Both carry `UnlockParams`, which say how the key is obtained.  None
//! of these types hold secrets in plaintext.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::encryption::EncryptedBlob;
use crate::crypto::escrow::WrappedKey;
use crate::crypto::kdf::KdfParams;
use crate::errors::{PassVaultError, Result};

/// Current record format version.
pub const CURRENT_VERSION: u8 = 1;

/// How a vault's key is obtained.  Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum UnlockParams {
    /// Key derived from a master password with PBKDF2.
    PasswordDerived { kdf: KdfParams },

    /// Random key held by the user as a key file, optionally escrowed.
    RandomKey {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        escrow: Option<WrappedKey>,
    },
}

impl UnlockParams {
    /// Strategy name for messages and logs.
    pub fn strategy_name(&self) -> &'static str {
        match self {
            Self::PasswordDerived { .. } => "password",
            Self::RandomKey { .. } => "key file",
        }
    }

    /// Check the non-secret parameters are usable.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::PasswordDerived { kdf } => kdf.validate(),
            Self::RandomKey { escrow: Some(w) } => w.validate(),
            Self::RandomKey { escrow: None } => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sealed layout
// ---------------------------------------------------------------------------

/// One record per identity: the encrypted entry list plus unlock params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub version: u8,
    pub created_at: DateTime<Utc>,
    pub unlock: UnlockParams,
    /// `Vec<VaultEntry>` as JSON, encrypted.
    pub entries: EncryptedBlob,
}

impl VaultRecord {
    /// Structural checks done before any key derivation.
    pub fn validate(&self) -> Result<()> {
        if self.version != CURRENT_VERSION {
            return Err(PassVaultError::IntegrityError(format!(
                "unsupported record version {}, expected {CURRENT_VERSION}",
                self.version
            )));
        }
        self.unlock.validate()?;
        self.entries.validate()
    }
}

// ---------------------------------------------------------------------------
// Row layout
// ---------------------------------------------------------------------------

/// Per-identity key record for the row layout.
///
/// The escrowed key lives here once, rather than being copied onto every
/// row.  `key_check` is an encrypted marker written at creation so a
/// vault with zero entries can still prove a key correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub version: u8,
    pub user_id: String,
    /// Random id stamped onto every row written under this key.
    pub key_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub unlock: UnlockParams,
    pub key_check: EncryptedBlob,
}

impl KeyRecord {
    pub fn validate(&self) -> Result<()> {
        if self.version != CURRENT_VERSION {
            return Err(PassVaultError::IntegrityError(format!(
                "unsupported key record version {}, expected {CURRENT_VERSION}",
                self.version
            )));
        }
        self.unlock.validate()?;
        self.key_check.validate()
    }
}

/// Plaintext sealed into a row's blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSecret {
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// One stored entry in the row layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRow {
    pub id: Uuid,
    pub user_id: String,
    pub key_id: Uuid,
    /// `RowSecret` as JSON, encrypted.
    pub blob: EncryptedBlob,
    pub site_name: String,
    pub username: String,
}

/// Marker sealed into `KeyRecord::key_check`.
pub const KEY_CHECK_MARKER: &str = "passvault-key-check-v1";

// ---------------------------------------------------------------------------
// Serde helper for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

/// `#[serde(with = "base64_bytes")]` for `Vec<u8>` fields.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(data))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(&s).map_err(serde::de::Error::custom)
    }
}
