//! Vault module: encrypted credential storage.
//!
//! - `VaultEntry` and `NewEntry` (`entry`)
//! - Persisted record types for both storage layouts (`format`)
//! - The `VaultStore` state machine (`store`)
//! - Shared per-identity handles (`sessions`)

pub mod entry;
pub mod format;
pub mod sessions;
pub mod store;

pub use entry::{NewEntry, VaultEntry};
pub use format::{KeyRecord, UnlockParams, VaultRecord, VaultRow};
pub use sessions::{SessionManager, SharedVault};
pub use store::{Backend, Credential, Initialized, KeyStrategy, VaultState, VaultStore};
