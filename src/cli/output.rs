//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::errors::{ErrorKind, PassVaultError};
use crate::password::{Strength, StrengthLabel};
use crate::vault::VaultEntry;

/// Shown in place of a password unless `--show` is passed.
const MASK: &str = "********";

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Report a failed command, with a hint matching the failure class.
pub fn report(err: &PassVaultError) {
    error(&err.to_string());
    match err.kind() {
        ErrorKind::Authentication => tip("Check the master password or key file and try again."),
        ErrorKind::Storage if err.is_retryable() => {
            tip("The vault storage is unavailable; this is not a password problem.")
        }
        ErrorKind::Integrity => tip("The stored vault cannot be read. Restore it from a backup."),
        _ => {}
    }
}

/// A strength label colored by how strong it is.
pub fn styled_strength(strength: &Strength) -> String {
    let label = strength.label.to_string();
    let styled = match strength.label {
        StrengthLabel::None | StrengthLabel::Weak => style(label).red(),
        StrengthLabel::Moderate => style(label).yellow(),
        StrengthLabel::Strong | StrengthLabel::VeryStrong => style(label).green(),
    };
    format!("{} ({}/4)", styled.bold(), strength.score)
}

/// Print a table of entries (ID, Site, Username, Password, Created).
pub fn print_entries_table(entries: &[&VaultEntry], show_passwords: bool) {
    if entries.is_empty() {
        info("No entries to show.");
        tip("Run `passvault add <SITE> <USERNAME>` to add one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Site", "Username", "Password", "Created"]);

    for e in entries {
        let password = if show_passwords {
            e.password.clone()
        } else {
            MASK.to_string()
        };
        table.add_row(vec![
            e.id.to_string(),
            e.site_name.clone(),
            e.username.clone(),
            password,
            e.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}
