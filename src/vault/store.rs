//! The vault state machine.
//!
//! `VaultStore` manages one identity's vault through its lifecycle:
//!
//! ```text
//! Uninitialized --initialize--> Unlocked <--unlock-- Locked
//!                                   |                  ^
//!                                   +------lock--------+
//! ```
//!
//! The key strategy only supplies a key; encryption, decryption and
//! persistence are written once here for both storage layouts.  The
//! live key exists only inside an unlocked session and is zeroized when
//! the session is dropped.

use std::sync::Arc;

use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::encryption::{decrypt, encrypt, open, seal};
use crate::crypto::escrow::{wrap, EscrowPublicKey};
use crate::crypto::kdf::{derive_key, KdfParams, DEFAULT_ITERATIONS};
use crate::crypto::keys::VaultKey;
use crate::errors::{PassVaultError, Result};
use crate::storage::{RecordStore, RowStore};

use super::entry::{NewEntry, VaultEntry};
use super::format::{
    KeyRecord, RowSecret, UnlockParams, VaultRecord, VaultRow, CURRENT_VERSION, KEY_CHECK_MARKER,
};

/// The persistence handle a vault is bound to.
///
/// Chooses the storage layout: `Sealed` keeps the whole entry list in
/// one encrypted record, `Rows` keeps one encrypted row per entry.
#[derive(Clone)]
pub enum Backend {
    Sealed(Arc<dyn RecordStore>),
    Rows(Arc<dyn RowStore>),
}

impl Backend {
    fn layout(&self) -> &'static str {
        match self {
            Self::Sealed(_) => "sealed",
            Self::Rows(_) => "rows",
        }
    }
}

/// Lifecycle state of a [`VaultStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No vault exists for this identity yet.
    Uninitialized,
    /// A vault exists; no key is held.
    Locked,
    /// The key is held and entries are cached in memory.
    Unlocked,
}

impl VaultState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

impl std::fmt::Display for VaultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a new vault's key is produced.  Fixed for the life of the vault.
pub enum KeyStrategy {
    /// Derive the key from a master password.
    PasswordDerived {
        password: Zeroizing<String>,
        iterations: u32,
    },
    /// Generate a random key, optionally wrapping it for escrow.
    RandomKey { escrow: Option<EscrowPublicKey> },
    /// A random key the caller generated and stored already, so the key
    /// is durable before the vault exists.  Unlocks like `RandomKey`.
    SuppliedKey {
        key: VaultKey,
        escrow: Option<EscrowPublicKey>,
    },
}

impl KeyStrategy {
    /// Password strategy at the default iteration count.
    pub fn password(password: impl Into<String>) -> Self {
        Self::PasswordDerived {
            password: Zeroizing::new(password.into()),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// What the user presents to unlock a vault.
pub enum Credential {
    Password(Zeroizing<String>),
    Key(VaultKey),
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password(Zeroizing::new(password.into()))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "a master password",
            Self::Key(_) => "a key file",
        }
    }
}

/// Result of [`VaultStore::initialize`].
#[derive(Debug)]
pub struct Initialized {
    /// The generated key for random-key vaults.  This is the only time it
    /// is surfaced; the caller must hand it to the user for safekeeping.
    pub key: Option<VaultKey>,
    /// Fingerprint of the escrowed key, when escrow was requested.
    pub escrow_fingerprint: Option<String>,
}

/// State held only while unlocked.
struct Session {
    key: VaultKey,
    /// Key id of the row layout's key record; unused for sealed vaults.
    key_id: Uuid,
    entries: Vec<VaultEntry>,
}

/// One identity's vault.
pub struct VaultStore {
    identity: String,
    backend: Backend,
    state: VaultState,
    /// Unlock parameters of the persisted vault, as last read.
    unlock: Option<UnlockParams>,
    session: Option<Session>,
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Bind to `identity`'s vault on `backend`.
    ///
    /// Starts `Locked` if a vault exists and `Uninitialized` otherwise.
    pub async fn open(identity: impl Into<String>, backend: Backend) -> Result<Self> {
        let identity = identity.into();
        let unlock = match &backend {
            Backend::Sealed(store) => store.get(&identity).await?.map(|r| r.unlock),
            Backend::Rows(store) => store.get_key_record(&identity).await?.map(|r| r.unlock),
        };
        let state = if unlock.is_some() {
            VaultState::Locked
        } else {
            VaultState::Uninitialized
        };
        debug!(layout = backend.layout(), state = state.as_str(), "opened vault");

        Ok(Self {
            identity,
            backend,
            state,
            unlock,
            session: None,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    /// Unlock parameters of the existing vault, if there is one.
    pub fn unlock_params(&self) -> Option<&UnlockParams> {
        self.unlock.as_ref()
    }

    /// True if this vault is unlocked with a key file rather than a password.
    pub fn uses_key_file(&self) -> bool {
        matches!(self.unlock, Some(UnlockParams::RandomKey { .. }))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create the vault with an empty entry set and unlock it.
    pub async fn initialize(&mut self, strategy: KeyStrategy) -> Result<Initialized> {
        self.require(VaultState::Uninitialized, "initialize")?;

        let (key, unlock, exported, escrow_fingerprint) = match strategy {
            KeyStrategy::PasswordDerived {
                password,
                iterations,
            } => {
                if password.is_empty() {
                    return Err(PassVaultError::EmptyMasterPassword);
                }
                let kdf = KdfParams::generate(iterations)?;
                let key = derive_key(password.as_bytes(), &kdf.salt, kdf.iterations)?;
                (key, UnlockParams::PasswordDerived { kdf }, None, None)
            }
            KeyStrategy::RandomKey { escrow } => random_key_unlock(VaultKey::generate()?, escrow)?,
            KeyStrategy::SuppliedKey { key, escrow } => random_key_unlock(key, escrow)?,
        };

        let key_id = match &self.backend {
            Backend::Sealed(store) => {
                let record = VaultRecord {
                    version: CURRENT_VERSION,
                    created_at: Utc::now(),
                    unlock: unlock.clone(),
                    entries: seal(&key, &Vec::<VaultEntry>::new())?,
                };
                store.insert(&self.identity, &record).await?;
                Uuid::nil()
            }
            Backend::Rows(store) => {
                let record = KeyRecord {
                    version: CURRENT_VERSION,
                    user_id: self.identity.clone(),
                    key_id: Uuid::new_v4(),
                    created_at: Utc::now(),
                    unlock: unlock.clone(),
                    key_check: encrypt(&key, KEY_CHECK_MARKER.as_bytes())?,
                };
                store.insert_key_record(&record).await?;
                record.key_id
            }
        };

        info!(
            layout = self.backend.layout(),
            strategy = unlock.strategy_name(),
            escrowed = escrow_fingerprint.is_some(),
            "initialized vault"
        );

        self.unlock = Some(unlock);
        self.session = Some(Session {
            key,
            key_id,
            entries: Vec::new(),
        });
        self.state = VaultState::Unlocked;

        Ok(Initialized {
            key: exported,
            escrow_fingerprint,
        })
    }

    /// Prove possession of the key and load the entries.
    ///
    /// A wrong credential fails with `WrongCredential` and leaves the vault
    /// locked.  Nothing is written to storage.
    pub async fn unlock(&mut self, credential: Credential) -> Result<&[VaultEntry]> {
        self.require(VaultState::Locked, "unlock")?;

        let (session, unlock) = match &self.backend {
            Backend::Sealed(store) => {
                let record = fetch_record(store.as_ref(), &self.identity).await?;
                record.validate()?;
                let key = key_for(&record.unlock, credential)?;
                let entries: Vec<VaultEntry> =
                    open(&key, &record.entries).map_err(as_wrong_credential)?;
                let session = Session {
                    key,
                    key_id: Uuid::nil(),
                    entries,
                };
                (session, record.unlock)
            }
            Backend::Rows(store) => {
                let record = fetch_key_record(store.as_ref(), &self.identity).await?;
                record.validate()?;
                let key = key_for(&record.unlock, credential)?;
                let marker = decrypt(&key, &record.key_check).map_err(as_wrong_credential)?;
                if !bool::from(marker.as_slice().ct_eq(KEY_CHECK_MARKER.as_bytes())) {
                    return Err(PassVaultError::IntegrityError(
                        "key check marker does not match".into(),
                    ));
                }
                let rows = store.select_rows(&self.identity).await?;
                let entries = decode_rows(&key, record.key_id, rows)?;
                let session = Session {
                    key,
                    key_id: record.key_id,
                    entries,
                };
                (session, record.unlock)
            }
        };

        info!(
            layout = self.backend.layout(),
            entries = session.entries.len(),
            "unlocked vault"
        );
        self.unlock = Some(unlock);
        self.state = VaultState::Unlocked;
        let session = self.session.insert(session);
        Ok(&session.entries)
    }

    /// Drop the key and the entry cache.  Does nothing unless unlocked.
    pub fn lock(&mut self) {
        if self.state == VaultState::Unlocked {
            self.session = None;
            self.state = VaultState::Locked;
            debug!("locked vault");
        }
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    /// Store a new entry and return it with its assigned id.
    pub async fn add_entry(&mut self, new: NewEntry) -> Result<VaultEntry> {
        let session = self.session("add an entry")?;
        new.validate()?;
        let entry = new.into_entry();

        match &self.backend {
            Backend::Sealed(store) => {
                let (mut record, mut entries) =
                    load_sealed(store.as_ref(), &self.identity, &session.key).await?;
                entries.push(entry.clone());
                record.entries = seal(&session.key, &entries)?;
                store.replace(&self.identity, &record).await?;
                self.session_mut()?.entries = entries;
            }
            Backend::Rows(store) => {
                let secret = RowSecret {
                    password: entry.password.clone(),
                    created_at: entry.created_at,
                };
                let row = VaultRow {
                    id: entry.id,
                    user_id: self.identity.clone(),
                    key_id: session.key_id,
                    blob: seal(&session.key, &secret)?,
                    site_name: entry.site_name.clone(),
                    username: entry.username.clone(),
                };
                store.insert_row(&row).await?;
                self.session_mut()?.entries.push(entry.clone());
            }
        }

        debug!(id = %entry.id, "added entry");
        Ok(entry)
    }

    /// Re-read the entries from storage and refresh the cache.
    pub async fn list_entries(&mut self) -> Result<&[VaultEntry]> {
        let session = self.session("list entries")?;
        let entries = match &self.backend {
            Backend::Sealed(store) => {
                load_sealed(store.as_ref(), &self.identity, &session.key)
                    .await?
                    .1
            }
            Backend::Rows(store) => {
                let rows = store.select_rows(&self.identity).await?;
                decode_rows(&session.key, session.key_id, rows)?
            }
        };

        let session = self.session_mut()?;
        session.entries = entries;
        Ok(&session.entries)
    }

    /// The entries loaded by the last unlock, list or mutation.
    pub fn entries(&self) -> Result<&[VaultEntry]> {
        Ok(&self.session("read entries")?.entries)
    }

    /// The cached entry with `id`, if any.
    pub fn get_entry(&self, id: Uuid) -> Result<Option<&VaultEntry>> {
        Ok(self
            .session("read an entry")?
            .entries
            .iter()
            .find(|e| e.id == id))
    }

    /// Cached entries whose site name or username contains `query`,
    /// ignoring case.
    pub fn search(&self, query: &str) -> Result<Vec<&VaultEntry>> {
        Ok(self
            .session("search entries")?
            .entries
            .iter()
            .filter(|e| e.matches(query))
            .collect())
    }

    /// Remove the entry with `id`.  Returns `false` if there was none.
    pub async fn delete_entry(&mut self, id: Uuid) -> Result<bool> {
        let session = self.session("delete an entry")?;

        let removed = match &self.backend {
            Backend::Sealed(store) => {
                let (mut record, mut entries) =
                    load_sealed(store.as_ref(), &self.identity, &session.key).await?;
                let before = entries.len();
                entries.retain(|e| e.id != id);
                let removed = entries.len() != before;
                if removed {
                    record.entries = seal(&session.key, &entries)?;
                    store.replace(&self.identity, &record).await?;
                }
                self.session_mut()?.entries = entries;
                removed
            }
            Backend::Rows(store) => {
                let removed = store.delete_row(&self.identity, id).await?;
                self.session_mut()?.entries.retain(|e| e.id != id);
                removed
            }
        };

        if removed {
            debug!(%id, "deleted entry");
        } else {
            debug!(%id, "delete of unknown entry ignored");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn require(&self, expected: VaultState, op: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PassVaultError::InvalidState {
                op,
                state: self.state.as_str(),
            })
        }
    }

    fn session(&self, op: &'static str) -> Result<&Session> {
        self.session.as_ref().ok_or(PassVaultError::InvalidState {
            op,
            state: self.state.as_str(),
        })
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        let state = self.state.as_str();
        self.session
            .as_mut()
            .ok_or(PassVaultError::InvalidState { op: "update entries", state })
    }
}

/// Obtain the key for `unlock` from `credential`.
fn key_for(unlock: &UnlockParams, credential: Credential) -> Result<VaultKey> {
    match (unlock, credential) {
        (UnlockParams::PasswordDerived { kdf }, Credential::Password(password)) => {
            derive_key(password.as_bytes(), &kdf.salt, kdf.iterations)
        }
        (UnlockParams::RandomKey { .. }, Credential::Key(key)) => Ok(key),
        (params, credential) => Err(PassVaultError::CredentialMismatch(format!(
            "this vault is unlocked with a {}, not {}",
            params.strategy_name(),
            credential.kind()
        ))),
    }
}

/// Unlock parameters for a random-key vault, escrowing `key` if asked.
///
/// Returns the key, its params, the copy handed back to the caller and
/// the escrow fingerprint.
fn random_key_unlock(
    key: VaultKey,
    escrow: Option<EscrowPublicKey>,
) -> Result<(VaultKey, UnlockParams, Option<VaultKey>, Option<String>)> {
    let wrapped = escrow.map(|pk| wrap(&pk, &key)).transpose()?;
    let fingerprint = wrapped.as_ref().map(|w| w.fingerprint());
    let exported = key.clone();
    Ok((
        key,
        UnlockParams::RandomKey { escrow: wrapped },
        Some(exported),
        fingerprint,
    ))
}

async fn fetch_record(store: &dyn RecordStore, identity: &str) -> Result<VaultRecord> {
    store
        .get(identity)
        .await?
        .ok_or_else(|| PassVaultError::VaultNotFound(identity.to_string()))
}

async fn fetch_key_record(store: &dyn RowStore, identity: &str) -> Result<KeyRecord> {
    store
        .get_key_record(identity)
        .await?
        .ok_or_else(|| PassVaultError::VaultNotFound(identity.to_string()))
}

/// Read the latest sealed record and decrypt its entry list.
async fn load_sealed(
    store: &dyn RecordStore,
    identity: &str,
    key: &VaultKey,
) -> Result<(VaultRecord, Vec<VaultEntry>)> {
    let record = fetch_record(store, identity).await?;
    record.validate()?;
    let entries = open(key, &record.entries).map_err(as_integrity)?;
    Ok((record, entries))
}

/// Decrypt rows written under `key_id`.  Empty placeholder rows are skipped.
fn decode_rows(key: &VaultKey, key_id: Uuid, rows: Vec<VaultRow>) -> Result<Vec<VaultEntry>> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        if row.blob.is_placeholder() {
            warn!(id = %row.id, "skipping placeholder row");
            continue;
        }
        if row.key_id != key_id {
            return Err(PassVaultError::IntegrityError(format!(
                "row {} was written under a different key",
                row.id
            )));
        }
        let secret: RowSecret = open(key, &row.blob).map_err(as_integrity)?;
        entries.push(VaultEntry {
            id: row.id,
            site_name: row.site_name,
            username: row.username,
            password: secret.password,
            created_at: secret.created_at,
        });
    }
    Ok(entries)
}

/// During unlock a failed decryption means the credential is wrong.
fn as_wrong_credential(err: PassVaultError) -> PassVaultError {
    match err {
        PassVaultError::DecryptionFailed => PassVaultError::WrongCredential,
        other => other,
    }
}

/// Once the key is proven, a failed decryption means the data is damaged.
fn as_integrity(err: PassVaultError) -> PassVaultError {
    match err {
        PassVaultError::DecryptionFailed => PassVaultError::IntegrityError(
            "stored data does not decrypt under the vault key".into(),
        ),
        other => other,
    }
}
