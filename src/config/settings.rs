use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::escrow::EscrowPublicKey;
use crate::crypto::kdf::DEFAULT_ITERATIONS;
use crate::errors::{PassVaultError, Result};
use crate::storage::RetryPolicy;

/// Which storage layout the CLI uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One sealed record file per identity.
    #[default]
    File,
    /// One SQLite row per entry.
    Sqlite,
}

/// Project-level configuration, loaded from `.passvault.toml`.
///
/// Every field has a default so PassVault works without a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to project root) holding vault data.
    #[serde(default = "default_vault_dir")]
    pub vault_dir: String,

    /// Storage layout for new and existing vaults.
    #[serde(default)]
    pub backend: StorageBackend,

    /// PBKDF2 iterations for new password vaults (minimum 100 000).
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    /// Attempts per storage call, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between storage attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Base64 X25519 public key; random-key vaults are escrowed to it.
    #[serde(default)]
    pub escrow_public_key: Option<String>,

    /// Length used by `generate` and `add --generate`.
    #[serde(default = "default_length")]
    pub default_length: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_dir() -> String {
    ".passvault".to_string()
}

fn default_pbkdf2_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_length() -> usize {
    16
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            backend: StorageBackend::default(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            escrow_public_key: None,
            default_length: default_length(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".passvault.toml";

    /// Load settings from `<project_dir>/.passvault.toml`.
    ///
    /// A missing file yields defaults.  A file that does not parse, or
    /// asks for fewer than the minimum PBKDF2 iterations, is an error.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            PassVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.validate()?;
        tracing::debug!(path = %config_path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pbkdf2_iterations < DEFAULT_ITERATIONS {
            return Err(PassVaultError::ConfigError(format!(
                "pbkdf2_iterations must be at least {DEFAULT_ITERATIONS}, got {}",
                self.pbkdf2_iterations
            )));
        }
        if self.default_length == 0 {
            return Err(PassVaultError::ConfigError(
                "default_length must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Full path to the vault directory.
    ///
    /// Example: `project_dir/.passvault`
    pub fn vault_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_dir)
    }

    /// Retry policy for the storage boundary.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    /// The configured escrow public key, if any.
    pub fn escrow_key(&self) -> Result<Option<EscrowPublicKey>> {
        self.escrow_public_key
            .as_deref()
            .map(EscrowPublicKey::from_base64)
            .transpose()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::escrow::EscrowKeyPair;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.vault_dir, ".passvault");
        assert_eq!(s.backend, StorageBackend::File);
        assert_eq!(s.pbkdf2_iterations, 100_000);
        assert_eq!(s.retry_attempts, 3);
        assert_eq!(s.retry_backoff_ms, 500);
        assert!(s.escrow_public_key.is_none());
        assert_eq!(s.default_length, 16);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.vault_dir, ".passvault");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
vault_dir = "secrets"
backend = "sqlite"
pbkdf2_iterations = 250000
retry_attempts = 5
retry_backoff_ms = 100
default_length = 24
"#;
        fs::write(tmp.path().join(".passvault.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.vault_dir, "secrets");
        assert_eq!(settings.backend, StorageBackend::Sqlite);
        assert_eq!(settings.pbkdf2_iterations, 250_000);
        assert_eq!(settings.default_length, 24);
        assert_eq!(
            settings.retry_policy(),
            RetryPolicy {
                attempts: 5,
                backoff: Duration::from_millis(100),
            }
        );
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".passvault.toml"), "backend = \"file\"\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.vault_dir, ".passvault");
        assert_eq!(settings.pbkdf2_iterations, 100_000);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".passvault.toml"), "not valid {{toml").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_weak_iteration_count() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(".passvault.toml"),
            "pbkdf2_iterations = 1000\n",
        )
        .unwrap();
        assert!(matches!(
            Settings::load(tmp.path()),
            Err(PassVaultError::ConfigError(_))
        ));
    }

    #[test]
    fn vault_path_respects_custom_vault_dir() {
        let s = Settings {
            vault_dir: "secrets".to_string(),
            ..Settings::default()
        };
        assert_eq!(
            s.vault_path(Path::new("/home/user/project")),
            PathBuf::from("/home/user/project/secrets")
        );
    }

    #[test]
    fn zero_retry_attempts_still_tries_once() {
        let s = Settings {
            retry_attempts: 0,
            ..Settings::default()
        };
        assert_eq!(s.retry_policy().attempts, 1);
    }

    #[test]
    fn escrow_key_parses_when_configured() {
        let pair = EscrowKeyPair::generate();
        let s = Settings {
            escrow_public_key: Some(pair.public_key().to_base64()),
            ..Settings::default()
        };
        assert_eq!(s.escrow_key().unwrap(), Some(pair.public_key()));

        let bad = Settings {
            escrow_public_key: Some("not base64!".into()),
            ..Settings::default()
        };
        assert!(bad.escrow_key().is_err());
        assert!(Settings::default().escrow_key().unwrap().is_none());
    }
}
