//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::{Settings, StorageBackend};
use crate::crypto::keyfile;
use crate::errors::{PassVaultError, Result};
use crate::storage::{FileRecordStore, Retrying};
use crate::vault::{Backend, Credential, VaultState, VaultStore};

/// Minimum master password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable checked before prompting for the master password.
pub const PASSWORD_ENV: &str = "PASSVAULT_PASSWORD";

/// PassVault CLI: client-side encrypted password vault.
#[derive(Parser)]
#[command(
    name = "passvault",
    about = "Client-side encrypted password vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Identity whose vault to use (default: the OS user name)
    #[arg(short, long, env = "PASSVAULT_USER", global = true)]
    pub user: Option<String>,

    /// Vault directory (overrides `vault_dir` in .passvault.toml)
    #[arg(long, global = true)]
    pub vault_dir: Option<String>,

    /// Key file for vaults created with --random-key
    #[arg(long, global = true)]
    pub key_file: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new vault
    Init {
        /// Use a random key saved to a key file instead of a master password
        #[arg(long)]
        random_key: bool,

        /// Where to write the key file (default: ./vault_key_<user>.bin)
        #[arg(long, requires = "random_key")]
        key_out: Option<String>,
    },

    /// Add a credential entry
    Add {
        /// Site or service name
        site: String,
        /// Username for the site
        username: String,
        /// Password (omit for interactive prompt)
        #[arg(short, long, conflicts_with = "generate")]
        password: Option<String>,
        /// Generate a random password instead of prompting
        #[arg(short, long)]
        generate: bool,
        /// Length of the generated password
        #[arg(short, long, requires = "generate")]
        length: Option<usize>,
    },

    /// List stored entries
    List {
        /// Only show entries whose site or username contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Show passwords in clear text
        #[arg(long)]
        show: bool,
    },

    /// Print one entry's password, or copy it to the clipboard
    Get {
        /// Entry id (as shown by `list`)
        id: String,
        /// Copy the password to the clipboard instead of printing it
        #[arg(short, long)]
        copy: bool,
    },

    /// Delete an entry by id
    Delete {
        /// Entry id (as shown by `list`)
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Generate a random password
    Generate {
        /// Password length (default from config, 16)
        #[arg(short, long)]
        length: Option<usize>,
        /// Exclude uppercase letters
        #[arg(long)]
        no_upper: bool,
        /// Exclude lowercase letters
        #[arg(long)]
        no_lower: bool,
        /// Exclude digits
        #[arg(long)]
        no_digits: bool,
        /// Exclude symbols
        #[arg(long)]
        no_symbols: bool,
        /// Copy the password to the clipboard instead of printing it
        #[arg(short, long)]
        copy: bool,
    },

    /// Score the strength of a password
    Strength {
        /// Password to score (omit for interactive prompt)
        password: Option<String>,
    },

    /// Generate the escrow keypair used to recover random-key vaults
    EscrowKeygen {
        /// Path for the secret key file
        #[arg(short, long)]
        out: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Get the master password, trying in order:
/// 1. `PASSVAULT_PASSWORD` env var (scripts, CI)
/// 2. Interactive prompt
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter master password")
        .interact()
        .map_err(|e| PassVaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new master password with confirmation (used during `init`).
///
/// Also respects `PASSVAULT_PASSWORD`.  Enforces a minimum length.
pub fn prompt_new_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            if pw.chars().count() < MIN_PASSWORD_LEN {
                return Err(PassVaultError::InvalidLength(format!(
                    "master password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose master password")
            .with_confirmation(
                "Confirm master password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| PassVaultError::CommandFailed(format!("password prompt: {e}")))?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        let strength = crate::password::score(&password);
        output::info(&format!("Password strength: {}", strength.label));
        return Ok(Zeroizing::new(password));
    }
}

/// The identity whose vault commands act on.
///
/// `--user` / `PASSVAULT_USER` win; otherwise the OS user name.
pub fn identity(cli: &Cli) -> Result<String> {
    cli.user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .filter(|u| !u.trim().is_empty())
        .ok_or(PassVaultError::MissingField("user (pass --user or set PASSVAULT_USER)"))
}

/// Load settings from the current directory.
pub fn load_settings() -> Result<(PathBuf, Settings)> {
    let cwd = std::env::current_dir()?;
    let settings = Settings::load(&cwd)?;
    Ok((cwd, settings))
}

/// The vault directory: `--vault-dir` if given, else from settings.
pub fn vault_dir(cli: &Cli, cwd: &Path, settings: &Settings) -> PathBuf {
    match &cli.vault_dir {
        Some(dir) => cwd.join(dir),
        None => settings.vault_path(cwd),
    }
}

/// Construct the storage backend named in settings, wrapped in the
/// configured retry policy.
pub fn build_backend(cli: &Cli, cwd: &Path, settings: &Settings) -> Result<Backend> {
    let dir = vault_dir(cli, cwd, settings);
    let policy = settings.retry_policy();

    match settings.backend {
        StorageBackend::File => Ok(Backend::Sealed(Arc::new(Retrying::new(
            FileRecordStore::new(dir),
            policy,
        )))),
        #[cfg(feature = "sqlite-store")]
        StorageBackend::Sqlite => {
            let store = crate::storage::SqliteRowStore::open(&dir.join("vault.db"))?;
            Ok(Backend::Rows(Arc::new(Retrying::new(store, policy))))
        }
        #[cfg(not(feature = "sqlite-store"))]
        StorageBackend::Sqlite => Err(PassVaultError::ConfigError(
            "backend = \"sqlite\" requires the sqlite-store feature".into(),
        )),
    }
}

/// Open the current identity's vault, failing if it does not exist yet.
pub async fn open_vault(cli: &Cli) -> Result<VaultStore> {
    let (cwd, settings) = load_settings()?;
    let identity = identity(cli)?;
    let backend = build_backend(cli, &cwd, &settings)?;
    let vault = VaultStore::open(identity.clone(), backend).await?;

    if vault.state() == VaultState::Uninitialized {
        output::tip("Run `passvault init` to create a vault.");
        return Err(PassVaultError::VaultNotFound(identity));
    }
    Ok(vault)
}

/// Gather the right credential for `vault` and unlock it.
pub async fn unlock_vault(cli: &Cli, vault: &mut VaultStore) -> Result<()> {
    let credential = if vault.uses_key_file() {
        let path = match &cli.key_file {
            Some(p) => PathBuf::from(p),
            None => std::env::current_dir()?.join(keyfile::default_file_name(vault.identity())),
        };
        Credential::Key(keyfile::read_key_file(&path)?)
    } else {
        Credential::Password(prompt_password()?)
    };

    vault.unlock(credential).await?;
    Ok(())
}

/// Parse an entry id as printed by `list`.
pub fn parse_entry_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| PassVaultError::InvalidEntryId(raw.to_string()))
}

/// Put `text` on the system clipboard.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| PassVaultError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_owned())
        .map_err(|e| PassVaultError::Clipboard(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("passvault").chain(args.iter().copied()))
    }

    #[test]
    fn explicit_user_wins() {
        let c = cli(&["--user", "alice", "list"]);
        assert_eq!(identity(&c).unwrap(), "alice");
    }

    #[test]
    fn vault_dir_flag_overrides_settings() {
        let c = cli(&["--vault-dir", "elsewhere", "list"]);
        let dir = vault_dir(&c, Path::new("/p"), &Settings::default());
        assert_eq!(dir, PathBuf::from("/p/elsewhere"));

        let c = cli(&["list"]);
        let dir = vault_dir(&c, Path::new("/p"), &Settings::default());
        assert_eq!(dir, PathBuf::from("/p/.passvault"));
    }

    #[test]
    fn password_and_generate_conflict() {
        let parsed = Cli::try_parse_from([
            "passvault", "add", "site", "user", "--password", "x", "--generate",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn key_out_requires_random_key() {
        assert!(Cli::try_parse_from(["passvault", "init", "--key-out", "k.bin"]).is_err());
        assert!(
            Cli::try_parse_from(["passvault", "init", "--random-key", "--key-out", "k.bin"])
                .is_ok()
        );
    }

    #[test]
    fn entry_ids_parse_as_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_entry_id(&format!(" {id}\n")).unwrap(), id);
        assert!(matches!(
            parse_entry_id("github"),
            Err(PassVaultError::InvalidEntryId(raw)) if raw == "github"
        ));
    }

    #[test]
    fn completions_reject_unknown_shells() {
        assert!(Cli::try_parse_from(["passvault", "completions", "csh"]).is_err());
        assert!(Cli::try_parse_from(["passvault", "completions", "zsh"]).is_ok());
    }

    #[test]
    fn get_takes_an_id_and_copy_flag() {
        let c = cli(&["get", "some-id", "--copy"]);
        assert!(matches!(c.command, Commands::Get { ref id, copy: true } if id == "some-id"));
    }
}
