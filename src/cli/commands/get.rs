//! `passvault get`: print or copy a single entry's password.

use crate::cli::output;
use crate::cli::{copy_to_clipboard, open_vault, parse_entry_id, unlock_vault, Cli};
use crate::errors::{PassVaultError, Result};

/// Execute the `get` command.
pub async fn execute(cli: &Cli, id: &str, copy: bool) -> Result<()> {
    let id = parse_entry_id(id)?;

    let mut vault = open_vault(cli).await?;
    unlock_vault(cli, &mut vault).await?;

    let entry = vault
        .get_entry(id)?
        .ok_or_else(|| PassVaultError::CommandFailed(format!("no entry with id {id}")))?;

    if copy {
        copy_to_clipboard(&entry.password)?;
        output::success(&format!(
            "Copied password for {} ({}) to clipboard",
            entry.site_name, entry.username
        ));
    } else {
        println!("{}", entry.password);
    }

    Ok(())
}
