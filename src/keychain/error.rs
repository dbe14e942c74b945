// Warden — Keychain error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Expected outcome for lookups of absent entries; callers branch on it.
    #[error("Credential not found")]
    NotFound,

    #[error("Keychain operation failed: {0}")]
    StoreFailed(String),

    #[error("Failed to run credential manager: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cleared {removed} of {total} keychain entries; failures: {failures:?}")]
    ClearIncomplete {
        removed: usize,
        total: usize,
        failures: Vec<String>,
    },
}

impl KeychainError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
