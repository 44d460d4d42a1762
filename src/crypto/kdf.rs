//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! The master password is stretched into a 256-bit AES-GCM key.  The
//! salt and iteration count are not secret: they are persisted next to
//! the ciphertext so the same password re-derives the same key.
//!
//! There is no separate "is this the right password" check.  A derived
//! key is proven correct only by successfully decrypting the vault.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use super::keys::{VaultKey, KEY_LEN};
use crate::errors::{PassVaultError, Result};

/// Length of the salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Default and minimum PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Non-secret derivation parameters stored alongside the vault.
///
/// Generated once when the vault is created and never regenerated:
/// a new salt would orphan every existing ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// The PBKDF2 salt (base64 in JSON).
    #[serde(with = "crate::vault::format::base64_bytes")]
    pub salt: Vec<u8>,

    /// PBKDF2 iteration count.  Older records without it use the default.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl KdfParams {
    /// Fresh parameters with a random salt.
    pub fn generate(iterations: u32) -> Result<Self> {
        Ok(Self {
            salt: generate_salt()?.to_vec(),
            iterations,
        })
    }

    /// Reject parameters that cannot belong to a valid vault.
    ///
    /// An all-zero salt is the sentinel left behind by a half-initialized
    /// vault, not a real salt.
    pub fn validate(&self) -> Result<()> {
        if self.salt.is_empty() {
            return Err(PassVaultError::IntegrityError("missing salt".into()));
        }
        if self.salt.len() != SALT_LEN {
            return Err(PassVaultError::IntegrityError(format!(
                "salt must be {SALT_LEN} bytes, got {}",
                self.salt.len()
            )));
        }
        if self.salt.iter().all(|b| *b == 0) {
            return Err(PassVaultError::IntegrityError("zero salt".into()));
        }
        if self.iterations < DEFAULT_ITERATIONS {
            return Err(PassVaultError::IntegrityError(format!(
                "iteration count {} is below the minimum of {DEFAULT_ITERATIONS}",
                self.iterations
            )));
        }
        Ok(())
    }
}

/// Output of [`derive`]: the key plus the salt it was derived with.
pub struct DerivedKey {
    pub key: VaultKey,
    pub salt: [u8; SALT_LEN],
}

/// Derive a key from `secret`, generating a fresh salt when none is given.
///
/// Uses [`DEFAULT_ITERATIONS`].  The same `(secret, salt)` pair always
/// yields bit-identical key material.
pub fn derive(secret: &str, salt: Option<&[u8; SALT_LEN]>) -> Result<DerivedKey> {
    let salt = match salt {
        Some(s) => *s,
        None => generate_salt()?,
    };
    let key = derive_key(secret.as_bytes(), &salt, DEFAULT_ITERATIONS)?;
    Ok(DerivedKey { key, salt })
}

/// Derive a 32-byte key with an explicit iteration count.
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> Result<VaultKey> {
    if password.is_empty() {
        return Err(PassVaultError::EmptyMasterPassword);
    }
    if iterations < DEFAULT_ITERATIONS {
        return Err(PassVaultError::KeyDerivationFailed(format!(
            "PBKDF2 iterations must be at least {DEFAULT_ITERATIONS} (got {iterations})"
        )));
    }

    let mut out = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    tracing::debug!(iterations, "derived vault key via PBKDF2");

    let key = VaultKey::from_array(out);
    out.zeroize();
    Ok(key)
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| PassVaultError::KeyDerivationFailed(format!("OS random source: {e}")))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic_for_same_salt() {
        let salt = [7u8; SALT_LEN];
        let a = derive("correct horse", Some(&salt)).unwrap();
        let b = derive("correct horse", Some(&salt)).unwrap();
        assert_eq!(a.key.as_bytes(), b.key.as_bytes());
        assert_eq!(a.salt, salt);
    }

    #[test]
    fn derive_without_salt_generates_one() {
        let a = derive("correct horse", None).unwrap();
        let b = derive("correct horse", None).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.key.as_bytes(), b.key.as_bytes());
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(matches!(
            derive_key(b"", &[1u8; SALT_LEN], DEFAULT_ITERATIONS),
            Err(PassVaultError::EmptyMasterPassword)
        ));
    }

    #[test]
    fn weak_iteration_count_is_rejected() {
        assert!(derive_key(b"pw", &[1u8; SALT_LEN], 1_000).is_err());
    }

    #[test]
    fn zero_salt_fails_validation() {
        let params = KdfParams {
            salt: vec![0u8; SALT_LEN],
            iterations: DEFAULT_ITERATIONS,
        };
        assert!(matches!(
            params.validate(),
            Err(PassVaultError::IntegrityError(_))
        ));
    }

    #[test]
    fn missing_salt_fails_validation() {
        let params = KdfParams {
            salt: Vec::new(),
            iterations: DEFAULT_ITERATIONS,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn generated_params_validate() {
        let params = KdfParams::generate(DEFAULT_ITERATIONS).unwrap();
        assert_eq!(params.salt.len(), SALT_LEN);
        params.validate().unwrap();
    }

    #[test]
    fn params_without_iterations_use_default() {
        let json = r#"{"salt":"AQIDBAUGBwgJCgsMDQ4PEA=="}"#;
        let params: KdfParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.iterations, DEFAULT_ITERATIONS);
        assert_eq!(params.salt.len(), SALT_LEN);
    }
}
