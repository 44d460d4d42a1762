//! `passvault strength`: score a password.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::errors::{PassVaultError, Result};
use crate::password;

/// Execute the `strength` command.
pub fn execute(candidate: Option<&str>) -> Result<()> {
    let candidate = if let Some(p) = candidate {
        Zeroizing::new(p.to_string())
    } else if !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Zeroizing::new(buf.trim_end_matches(['\r', '\n']).to_string())
    } else {
        Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt("Password to score")
                .allow_empty_password(true)
                .interact()
                .map_err(|e| PassVaultError::CommandFailed(format!("input prompt: {e}")))?,
        )
    };

    let strength = password::score(&candidate);
    println!("{}", output::styled_strength(&strength));
    Ok(())
}
