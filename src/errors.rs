use thiserror::Error;

/// Broad failure class of a [`PassVaultError`].
///
/// Callers branch on this instead of individual variants: a user typing
/// the wrong password and a storage outage must never be reported the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; report immediately, do not retry.
    Validation,
    /// Wrong master password or wrong key file.
    Authentication,
    /// The backing store is unreachable or rejected the operation.
    Storage,
    /// The persisted vault is malformed; the user must reset or recover.
    Integrity,
    /// Bugs and local environment failures.
    Internal,
}

/// All errors that can occur in PassVault.
#[derive(Debug, Error)]
pub enum PassVaultError {
    // --- Validation errors ---
    #[error("Select at least one character type")]
    EmptyCharset,

    #[error("Invalid length: {0}")]
    InvalidLength(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("'{0}' is not an entry id (expected a UUID as shown by `list`)")]
    InvalidEntryId(String),

    #[error("Master password cannot be empty")]
    EmptyMasterPassword,

    #[error("Key file must be exactly {expected} bytes, got {actual}")]
    InvalidKeyFile { expected: usize, actual: usize },

    #[error("Cannot {op} while the vault is {state}")]
    InvalidState { op: &'static str, state: &'static str },

    #[error("Credential does not match this vault: {0}")]
    CredentialMismatch(String),

    #[error("Invalid escrow public key: {0}")]
    InvalidPublicKey(String),

    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- Authentication errors ---
    #[error("Wrong master password or key file")]
    WrongCredential,

    #[error("Decryption failed: wrong key or tampered data")]
    DecryptionFailed,

    // --- Storage errors ---
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    #[error("No vault found for {0}")]
    VaultNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Integrity errors ---
    #[error("Vault data is corrupted: {0} (reset or recover the vault)")]
    IntegrityError(String),

    // --- Internal errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

impl PassVaultError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyCharset
            | Self::InvalidLength(_)
            | Self::MissingField(_)
            | Self::InvalidEntryId(_)
            | Self::EmptyMasterPassword
            | Self::InvalidKeyFile { .. }
            | Self::InvalidState { .. }
            | Self::CredentialMismatch(_)
            | Self::InvalidPublicKey(_)
            | Self::ConfigError(_) => ErrorKind::Validation,

            Self::WrongCredential | Self::DecryptionFailed => ErrorKind::Authentication,

            Self::StorageUnavailable(_)
            | Self::StorageConflict(_)
            | Self::VaultNotFound(_)
            | Self::Io(_) => ErrorKind::Storage,

            Self::IntegrityError(_) => ErrorKind::Integrity,

            Self::EncryptionFailed(_)
            | Self::KeyDerivationFailed(_)
            | Self::SerializationError(_)
            | Self::CommandFailed(_)
            | Self::UserCancelled
            | Self::Clipboard(_) => ErrorKind::Internal,
        }
    }

    /// Whether a caller may retry the failed operation as-is.
    ///
    /// Only transient storage outages qualify; conflicts and missing
    /// records will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

/// Convenience type alias for PassVault results.
pub type Result<T> = std::result::Result<T, PassVaultError>;
