//! `passvault delete`: remove an entry from the vault.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{open_vault, parse_entry_id, unlock_vault, Cli};
use crate::errors::{PassVaultError, Result};

/// Execute the `delete` command.
pub async fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    let id = parse_entry_id(id)?;

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete entry {id}?"))
            .default(false)
            .interact()
            .map_err(|e| PassVaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let mut vault = open_vault(cli).await?;
    unlock_vault(cli, &mut vault).await?;

    if vault.delete_entry(id).await? {
        output::success(&format!("Deleted entry {id}"));
    } else {
        output::info(&format!("No entry with id {id}; nothing deleted."));
    }

    Ok(())
}
