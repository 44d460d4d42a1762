//! `passvault add`: store a new credential entry.

use crate::cli::output;
use crate::cli::{load_settings, open_vault, unlock_vault, Cli};
use crate::errors::{PassVaultError, Result};
use crate::password::CharsetFlags;
use crate::vault::NewEntry;

/// Execute the `add` command.
pub async fn execute(
    cli: &Cli,
    site: &str,
    username: &str,
    password: Option<&str>,
    generate: bool,
    length: Option<usize>,
) -> Result<()> {
    let secret = if generate {
        let (_, settings) = load_settings()?;
        crate::password::generate(
            length.unwrap_or(settings.default_length),
            CharsetFlags::default(),
        )?
    } else if let Some(p) = password {
        output::warning("Password provided on the command line may appear in shell history.");
        p.to_string()
    } else {
        dialoguer::Password::new()
            .with_prompt(format!("Password for {username}@{site}"))
            .interact()
            .map_err(|e| PassVaultError::CommandFailed(format!("input prompt: {e}")))?
    };

    let mut vault = open_vault(cli).await?;
    unlock_vault(cli, &mut vault).await?;

    let entry = vault
        .add_entry(NewEntry::new(site, username, secret))
        .await?;

    output::success(&format!(
        "Added {} for {} ({} total)",
        entry.site_name,
        entry.username,
        vault.entries()?.len()
    ));
    if generate {
        output::info(&format!("Generated password: {}", entry.password));
    }
    output::tip(&format!("Entry id: {}", entry.id));

    Ok(())
}
