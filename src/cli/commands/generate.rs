//! `passvault generate`: print a random password and its strength.

use crate::cli::output;
use crate::cli::{copy_to_clipboard, load_settings};
use crate::errors::Result;
use crate::password::{self, CharsetFlags};

/// Which character classes to exclude.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exclusions {
    pub upper: bool,
    pub lower: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Exclusions {
    fn flags(self) -> CharsetFlags {
        CharsetFlags {
            upper: !self.upper,
            lower: !self.lower,
            digits: !self.digits,
            symbols: !self.symbols,
        }
    }
}

/// Execute the `generate` command.
pub fn execute(length: Option<usize>, exclude: Exclusions, copy: bool) -> Result<()> {
    let length = match length {
        Some(n) => n,
        None => load_settings()?.1.default_length,
    };

    let generated = password::generate(length, exclude.flags())?;
    let strength = password::score(&generated);

    if copy {
        copy_to_clipboard(&generated)?;
        output::success(&format!("Copied {length}-character password to clipboard"));
    } else {
        println!("{generated}");
    }
    output::info(&format!("Strength: {}", output::styled_strength(&strength)));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_exclusions_enables_every_class() {
        assert_eq!(Exclusions::default().flags(), CharsetFlags::default());
    }

    #[test]
    fn excluding_everything_leaves_an_empty_charset() {
        let all = Exclusions {
            upper: true,
            lower: true,
            digits: true,
            symbols: true,
        };
        assert!(all.flags().alphabet().is_empty());
    }
}
