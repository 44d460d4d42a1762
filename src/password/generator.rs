//! Random password generation.
//!
//! Characters are drawn from the OS CSPRNG, one random byte per output
//! character, mapped into the enabled alphabet by modulo.  The alphabet
//! is always concatenated in the order upper, lower, digits, symbols.

use rand::rngs::OsRng;
use rand::TryRngCore;
use zeroize::Zeroizing;

use crate::errors::{PassVaultError, Result};

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/";

/// Upper bound on a single generated password.
pub const MAX_LENGTH: usize = 4096;

/// Which character classes a generated password may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharsetFlags {
    pub upper: bool,
    pub lower: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for CharsetFlags {
    fn default() -> Self {
        Self {
            upper: true,
            lower: true,
            digits: true,
            symbols: true,
        }
    }
}

impl CharsetFlags {
    /// The concatenated alphabet for the enabled classes.
    pub fn alphabet(&self) -> String {
        let mut chars = String::new();
        if self.upper {
            chars.push_str(UPPERCASE);
        }
        if self.lower {
            chars.push_str(LOWERCASE);
        }
        if self.digits {
            chars.push_str(DIGITS);
        }
        if self.symbols {
            chars.push_str(SYMBOLS);
        }
        chars
    }
}

/// Generate a `length`-character password from the enabled classes.
///
/// All flags off is a user input error; no default alphabet is
/// substituted.
pub fn generate(length: usize, flags: CharsetFlags) -> Result<String> {
    if length == 0 {
        return Err(PassVaultError::InvalidLength(
            "password length must be at least 1".into(),
        ));
    }
    if length > MAX_LENGTH {
        return Err(PassVaultError::InvalidLength(format!(
            "password length cannot exceed {MAX_LENGTH}"
        )));
    }

    let alphabet = flags.alphabet().into_bytes();
    if alphabet.is_empty() {
        return Err(PassVaultError::EmptyCharset);
    }

    let mut random = Zeroizing::new(vec![0u8; length]);
    OsRng
        .try_fill_bytes(&mut random)
        .map_err(|e| PassVaultError::CommandFailed(format!("OS random source: {e}")))?;

    // The alphabet is pure ASCII, so each byte is one char.
    let password: String = random
        .iter()
        .map(|b| char::from(alphabet[usize::from(*b) % alphabet.len()]))
        .collect();

    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_flags_off_is_an_error() {
        let flags = CharsetFlags {
            upper: false,
            lower: false,
            digits: false,
            symbols: false,
        };
        assert!(matches!(
            generate(16, flags),
            Err(PassVaultError::EmptyCharset)
        ));
    }

    #[test]
    fn zero_length_is_an_error() {
        assert!(generate(0, CharsetFlags::default()).is_err());
    }

    #[test]
    fn too_long_is_an_error() {
        assert!(generate(MAX_LENGTH + 1, CharsetFlags::default()).is_err());
    }

    #[test]
    fn alphabet_order_is_upper_lower_digits_symbols() {
        let flags = CharsetFlags::default();
        let alphabet = flags.alphabet();
        assert!(alphabet.starts_with("ABC"));
        assert_eq!(&alphabet[26..29], "abc");
        assert_eq!(&alphabet[52..62], "0123456789");
        assert!(alphabet.ends_with("?/"));
        assert_eq!(alphabet.len(), 26 + 26 + 10 + SYMBOLS.len());
    }

    #[test]
    fn digits_only_produces_digits() {
        let flags = CharsetFlags {
            upper: false,
            lower: false,
            digits: true,
            symbols: false,
        };
        let pw = generate(64, flags).unwrap();
        assert_eq!(pw.len(), 64);
        assert!(pw.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn successive_calls_differ() {
        let a = generate(32, CharsetFlags::default()).unwrap();
        let b = generate(32, CharsetFlags::default()).unwrap();
        assert_ne!(a, b);
    }
}
