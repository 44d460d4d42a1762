//! AES-256-GCM envelope encryption.
//!
//! Each call to `encrypt` draws a fresh random 12-byte nonce.  Reusing a
//! nonce under the same key breaks GCM completely, so there is no API
//! that accepts a caller-supplied nonce.
//!
//! Structured values go through `seal`/`open`, which serialize to JSON
//! before encrypting.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::keys::VaultKey;
use crate::errors::{PassVaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Output of one authenticated-encryption operation.
///
/// Both fields are only meaningful together.  An empty or all-zero pair
/// is the "no data yet" placeholder, never a valid payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// The nonce (base64 in JSON).
    #[serde(with = "crate::vault::format::base64_bytes")]
    pub iv: Vec<u8>,

    /// Ciphertext followed by the 16-byte auth tag (base64 in JSON).
    #[serde(with = "crate::vault::format::base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// The "no data yet" sentinel.
    pub fn placeholder() -> Self {
        Self {
            iv: Vec::new(),
            ciphertext: Vec::new(),
        }
    }

    /// Returns `true` for the empty or all-zero sentinel.
    pub fn is_placeholder(&self) -> bool {
        let all_zero = |bytes: &[u8]| bytes.iter().all(|b| *b == 0);
        (self.iv.is_empty() || all_zero(&self.iv))
            && (self.ciphertext.is_empty() || all_zero(&self.ciphertext))
    }

    /// Reject blobs that cannot have come from `encrypt`.
    pub fn validate(&self) -> Result<()> {
        if self.is_placeholder() {
            return Err(PassVaultError::IntegrityError(
                "encrypted payload is empty".into(),
            ));
        }
        if self.iv.len() != NONCE_LEN {
            return Err(PassVaultError::IntegrityError(format!(
                "iv must be {NONCE_LEN} bytes, got {}",
                self.iv.len()
            )));
        }
        if self.ciphertext.len() < TAG_LEN {
            return Err(PassVaultError::IntegrityError(
                "ciphertext is shorter than the auth tag".into(),
            ));
        }
        Ok(())
    }
}

/// Encrypt raw `plaintext` under `key`.
pub fn encrypt(key: &VaultKey, plaintext: &[u8]) -> Result<EncryptedBlob> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| PassVaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| PassVaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    Ok(EncryptedBlob {
        iv: nonce.to_vec(),
        ciphertext,
    })
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Fails with `DecryptionFailed` on a wrong key, tampered data or a
/// malformed nonce.  The plaintext is wiped when the returned buffer
/// is dropped.
pub fn decrypt(key: &VaultKey, blob: &EncryptedBlob) -> Result<Zeroizing<Vec<u8>>> {
    if blob.iv.len() != NONCE_LEN {
        return Err(PassVaultError::DecryptionFailed);
    }
    let nonce = Nonce::from_slice(&blob.iv);

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| PassVaultError::DecryptionFailed)?;

    let plaintext = cipher
        .decrypt(nonce, blob.ciphertext.as_slice())
        .map_err(|_| PassVaultError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}

/// Serialize `value` to JSON and encrypt it.
pub fn seal<T: Serialize + ?Sized>(key: &VaultKey, value: &T) -> Result<EncryptedBlob> {
    let json = Zeroizing::new(
        serde_json::to_vec(value)
            .map_err(|e| PassVaultError::SerializationError(format!("seal: {e}")))?,
    );
    encrypt(key, &json)
}

/// Decrypt a blob and deserialize its JSON payload.
///
/// A payload that authenticates but does not parse is reported as an
/// integrity failure: the key was right, the data is not.
pub fn open<T: DeserializeOwned>(key: &VaultKey, blob: &EncryptedBlob) -> Result<T> {
    let plaintext = decrypt(key, blob)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| PassVaultError::IntegrityError(format!("decrypted payload: {e}")))
}
