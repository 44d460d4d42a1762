//! `passvault list`: show the entries in the vault.

use crate::cli::output;
use crate::cli::{open_vault, unlock_vault, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub async fn execute(cli: &Cli, search: Option<&str>, show: bool) -> Result<()> {
    let mut vault = open_vault(cli).await?;
    unlock_vault(cli, &mut vault).await?;

    let entries = match search {
        Some(query) => vault.search(query)?,
        None => vault.entries()?.iter().collect(),
    };

    output::print_entries_table(&entries, show);
    Ok(())
}
