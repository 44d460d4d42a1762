//! `passvault init`: create a new vault for the current identity.

use std::path::PathBuf;

use crate::cli::output;
use crate::cli::{build_backend, identity, load_settings, prompt_new_password, Cli};
use crate::crypto::keyfile;
use crate::crypto::VaultKey;
use crate::errors::{PassVaultError, Result};
use crate::vault::{KeyStrategy, VaultState, VaultStore};

/// Execute the `init` command.
pub async fn execute(cli: &Cli, random_key: bool, key_out: Option<&str>) -> Result<()> {
    let (cwd, settings) = load_settings()?;
    let identity = identity(cli)?;
    let backend = build_backend(cli, &cwd, &settings)?;
    let mut vault = VaultStore::open(identity.clone(), backend).await?;

    if vault.state() != VaultState::Uninitialized {
        output::tip("Use `passvault add` to add entries to the existing vault.");
        return Err(PassVaultError::StorageConflict(format!(
            "a vault already exists for '{identity}'"
        )));
    }

    if !random_key {
        let password = prompt_new_password()?;
        vault
            .initialize(KeyStrategy::PasswordDerived {
                password,
                iterations: settings.pbkdf2_iterations,
            })
            .await?;
        output::success(&format!("Vault created for '{identity}'"));
        output::tip("Your master password is the only way in. It cannot be recovered.");
        output::tip("Run `passvault add <SITE> <USERNAME>` to add an entry.");
        return Ok(());
    }

    let key_path = match key_out {
        Some(p) => PathBuf::from(p),
        None => cwd.join(keyfile::default_file_name(&identity)),
    };
    if key_path.exists() {
        return Err(PassVaultError::CommandFailed(format!(
            "refusing to overwrite existing file at {}",
            key_path.display()
        )));
    }
    let escrow = settings.escrow_key()?;

    // Key file first: a vault record must never exist without its key.
    let key = VaultKey::generate()?;
    keyfile::write_key_file(&key_path, &key)?;

    let init = match vault
        .initialize(KeyStrategy::SuppliedKey { key, escrow })
        .await
    {
        Ok(init) => init,
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&key_path) {
                tracing::warn!(path = %key_path.display(), error = %rm, "could not remove unused key file");
            }
            return Err(e);
        }
    };

    output::success(&format!("Vault created for '{identity}'"));
    output::info(&format!("Key file written to {}", key_path.display()));
    match init.escrow_fingerprint {
        Some(fp) => output::info(&format!("Key escrowed for recovery (fingerprint {fp})")),
        None => output::warning(
            "No escrow key configured. Losing the key file means losing the vault.",
        ),
    }
    output::tip("Pass --key-file <PATH> if you move the key file.");

    Ok(())
}
