//! Password tools that need no vault: generation and strength scoring.

pub mod generator;
pub mod strength;

pub use generator::{generate, CharsetFlags};
pub use strength::{score, Strength, StrengthLabel};
