// Warden — Audit error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit storage error: {0}")]
    Storage(#[from] crate::kv::KvError),

    #[error("Audit log is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),
}
