//! Key escrow: wrapping a random vault key for server-side recovery.
//!
//! The vault key is sealed to a long-lived server X25519 public key:
//!
//! ```text
//! shared   = X25519(ephemeral_secret, server_public)
//! wrap_key = HKDF-SHA256(ikm = shared,
//!                        salt = ephemeral_public || server_public,
//!                        info = "passvault-escrow-v1")
//! wrapped  = ephemeral_public(32) || nonce(12) || AES-256-GCM(wrap_key, vault_key)(48)
//! ```
//!
//! Only the holder of the server's secret key can recover the vault key.
//! Unwrapping is deliberately not implemented here: the secret half never
//! lives on a client.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::encryption::{NONCE_LEN, TAG_LEN};
use super::keys::{VaultKey, KEY_LEN};
use crate::errors::{PassVaultError, Result};

/// HKDF context string binding the wrap key to this scheme.
pub const ESCROW_INFO: &[u8] = b"passvault-escrow-v1";

/// Length of an X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Total length of a wrapped key.
pub const WRAPPED_LEN: usize = PUBLIC_KEY_LEN + NONCE_LEN + KEY_LEN + TAG_LEN;

/// The server's escrow public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EscrowPublicKey(PublicKey);

impl EscrowPublicKey {
    /// Parse a base64-encoded 32-byte X25519 public key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| PassVaultError::InvalidPublicKey(format!("not base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Build from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            PassVaultError::InvalidPublicKey(format!(
                "expected {PUBLIC_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        if arr.iter().all(|b| *b == 0) {
            return Err(PassVaultError::InvalidPublicKey("all-zero key".into()));
        }
        Ok(Self(PublicKey::from(arr)))
    }

    /// Base64 form, as stored in `.passvault.toml`.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for EscrowPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscrowPublicKey({})", self.to_base64())
    }
}

/// A vault key sealed to the escrow public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey(#[serde(with = "crate::vault::format::base64_bytes")] Vec<u8>);

impl WrappedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// SHA-256 of the wrapped bytes, base64 encoded.  Shown to the user so
    /// the escrow copy can be matched with the recovery service's records.
    pub fn fingerprint(&self) -> String {
        BASE64.encode(Sha256::digest(&self.0))
    }

    /// Check the wrapped blob has the expected shape.
    pub fn validate(&self) -> Result<()> {
        if self.0.len() != WRAPPED_LEN {
            return Err(PassVaultError::IntegrityError(format!(
                "wrapped key must be {WRAPPED_LEN} bytes, got {}",
                self.0.len()
            )));
        }
        Ok(())
    }
}

/// Seal `vault_key` to `server_key`.
pub fn wrap(server_key: &EscrowPublicKey, vault_key: &VaultKey) -> Result<WrappedKey> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&server_key.0);

    if !shared.was_contributory() {
        return Err(PassVaultError::InvalidPublicKey(
            "low-order escrow public key".into(),
        ));
    }

    let wrap_key = derive_wrap_key(
        shared.as_bytes(),
        ephemeral_public.as_bytes(),
        server_key.as_bytes(),
    )?;

    let cipher = Aes256Gcm::new_from_slice(wrap_key.as_slice())
        .map_err(|e| PassVaultError::EncryptionFailed(format!("escrow key: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, vault_key.as_bytes().as_slice())
        .map_err(|e| PassVaultError::EncryptionFailed(format!("escrow wrap: {e}")))?;

    let mut out = Vec::with_capacity(WRAPPED_LEN);
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);

    tracing::debug!("wrapped vault key for escrow");
    Ok(WrappedKey(out))
}

/// HKDF-SHA256 over the X25519 shared secret.
fn derive_wrap_key(
    shared: &[u8],
    ephemeral_public: &[u8; PUBLIC_KEY_LEN],
    server_public: &[u8; PUBLIC_KEY_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let mut salt = [0u8; PUBLIC_KEY_LEN * 2];
    salt[..PUBLIC_KEY_LEN].copy_from_slice(ephemeral_public);
    salt[PUBLIC_KEY_LEN..].copy_from_slice(server_public);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(ESCROW_INFO, okm.as_mut_slice())
        .map_err(|e| PassVaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

/// A server escrow keypair.
///
/// Generated once by an operator with `passvault escrow-keygen`; the
/// public half is distributed to clients, the secret half stays with the
/// recovery service.
pub struct EscrowKeyPair {
    secret: StaticSecret,
    public: EscrowPublicKey,
}

impl EscrowKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = EscrowPublicKey(PublicKey::from(&secret));
        Self { secret, public }
    }

    pub fn public_key(&self) -> EscrowPublicKey {
        self.public
    }

    /// Raw secret bytes, for writing to the operator's key file.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }
}
