// Warden — Top-level error types
//
// Aggregates errors from every module into a single error enum for the
// application boundary.

use thiserror::Error;

/// Top-level error type for all Warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Cipher error: {0}")]
    Cipher(#[from] crate::cipher::CipherError),

    #[error("Keychain error: {0}")]
    Keychain(#[from] crate::keychain::KeychainError),

    #[error("Vault error: {0}")]
    Vault(#[from] crate::vault::VaultError),

    #[error("Audit error: {0}")]
    Audit(#[from] crate::audit::AuditError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::kv::KvError),

    #[error("Invalid configuration ({field}): {reason}")]
    Config { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, WardenError>;
