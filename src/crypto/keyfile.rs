//! Key files: the on-disk form of an exported random vault key.
//!
//! A key file holds exactly the 32 raw key bytes.  It has no header, no
//! version and no checksum, so the only validation possible on import
//! is the length check.

use std::fs;
use std::path::Path;

use zeroize::Zeroizing;

use super::keys::{VaultKey, KEY_LEN};
use crate::errors::{PassVaultError, Result};

/// Default file name for an exported key: `vault_key_<identity>.bin`.
pub fn default_file_name(identity: &str) -> String {
    let safe: String = identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("vault_key_{safe}.bin")
}

/// Write `key` to `path` as a key file.
///
/// Refuses to overwrite an existing file, since that file may be the only
/// credential for another vault.
pub fn write_key_file(path: &Path, key: &VaultKey) -> Result<()> {
    let bytes = Zeroizing::new(key.export());
    write_secret_file(path, bytes.as_slice())
}

/// Load a key file and import it as a [`VaultKey`].
pub fn read_key_file(path: &Path) -> Result<VaultKey> {
    if !path.exists() {
        return Err(PassVaultError::CommandFailed(format!(
            "key file not found at {}",
            path.display()
        )));
    }

    // Check the size before reading so an unrelated large file is never
    // pulled into memory.
    let len = fs::metadata(path)?.len();
    if len != KEY_LEN as u64 {
        return Err(PassVaultError::InvalidKeyFile {
            expected: KEY_LEN,
            actual: usize::try_from(len).unwrap_or(usize::MAX),
        });
    }

    let data = Zeroizing::new(fs::read(path)?);
    VaultKey::import(&data)
}

/// Write secret bytes to a new file with owner-only permissions.
pub(crate) fn write_secret_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if path.exists() {
        return Err(PassVaultError::CommandFailed(format!(
            "refusing to overwrite existing file at {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, bytes)?;

    // On Unix, restrict permissions to owner-only read/write.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
