//! The vault's symmetric key.
//!
//! A `VaultKey` is either derived from a master password (see `kdf`) or
//! generated at random and handed to the user as a key file.  In the
//! random-key case the exported bytes are the only durable credential:
//! lose them without an escrow copy and the vault is gone.
//!
//! The key is wiped from memory when dropped.

use rand::rngs::OsRng;
use rand::TryRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{PassVaultError, Result};

/// Length of the vault key in bytes (256 bits, for AES-256-GCM).
pub const KEY_LEN: usize = 32;

/// A 32-byte AES-256-GCM key that zeroes its memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    bytes: [u8; KEY_LEN],
}

impl VaultKey {
    /// Wrap raw key bytes.
    pub fn from_array(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| PassVaultError::KeyDerivationFailed(format!("OS random source: {e}")))?;
        let key = Self::from_array(bytes);
        bytes.zeroize();
        Ok(key)
    }

    /// Export the raw key bytes: no header, no metadata.
    pub fn export(&self) -> [u8; KEY_LEN] {
        self.bytes
    }

    /// Import a key from its exported form.
    ///
    /// Anything that is not exactly 32 bytes is rejected before the bytes
    /// ever reach a cipher.
    pub fn import(data: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = data.try_into().map_err(|_| PassVaultError::InvalidKeyFile {
            expected: KEY_LEN,
            actual: data.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey(<redacted>)")
    }
}
