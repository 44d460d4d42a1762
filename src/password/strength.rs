//! Password strength scoring.
//!
//! Six independent checks each add one point: length >= 8, length >= 16,
//! an ASCII uppercase letter, an ASCII lowercase letter, a digit, and any
//! other character.  The sum is clamped to 0..=4 and mapped to a label.
//! The empty password short-circuits to `{0, None}`.

use std::fmt;

/// Human-readable strength bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrengthLabel {
    None,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl fmt::Display for StrengthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "None",
            Self::Weak => "Weak",
            Self::Moderate => "Moderate",
            Self::Strong => "Strong",
            Self::VeryStrong => "Very Strong",
        };
        f.write_str(label)
    }
}

/// Labels indexed by the clamped score.
const LABELS: [StrengthLabel; 5] = [
    StrengthLabel::Weak,
    StrengthLabel::Weak,
    StrengthLabel::Moderate,
    StrengthLabel::Strong,
    StrengthLabel::VeryStrong,
];

/// Highest possible score.
pub const MAX_SCORE: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strength {
    pub score: u8,
    pub label: StrengthLabel,
}

/// Score `password`.
pub fn score(password: &str) -> Strength {
    if password.is_empty() {
        return Strength {
            score: 0,
            label: StrengthLabel::None,
        };
    }

    let length = password.chars().count();
    let checks = [
        length >= 8,
        length >= 16,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];

    let raw = checks.iter().filter(|passed| **passed).count();
    let clamped = raw.min(usize::from(MAX_SCORE));

    Strength {
        score: u8::try_from(clamped).unwrap_or(MAX_SCORE),
        label: LABELS[clamped],
    }
}
