// Warden — Vault error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Every violated rule, in the order checked.
    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Credential not found")]
    NotFound,

    #[error("Failed to store credential: {0}")]
    StoreFailed(String),

    /// Retrieval failures share one variant; the message is the only hint
    /// of which stage failed.
    #[error("Failed to retrieve credential: {0}")]
    RetrieveFailed(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::kv::KvError),
}
