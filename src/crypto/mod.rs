//! Cryptographic primitives for PassVault.
//!
//! This module provides:
//! - AES-256-GCM envelope encryption (`encryption`)
//! - PBKDF2-HMAC-SHA256 password-based key derivation (`kdf`)
//! - The zeroizing vault key and its export form (`keys`, `keyfile`)
//! - X25519 key escrow wrapping (`escrow`)

pub mod encryption;
pub mod escrow;
pub mod kdf;
pub mod keyfile;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, VaultKey, ...};
pub use encryption::{decrypt, encrypt, open, seal, EncryptedBlob};
pub use escrow::{wrap, EscrowKeyPair, EscrowPublicKey, WrappedKey};
pub use kdf::{derive, derive_key, generate_salt, DerivedKey, KdfParams};
pub use keyfile::{read_key_file, write_key_file};
pub use keys::VaultKey;
