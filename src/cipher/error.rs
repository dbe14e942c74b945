// Warden — Cipher error types

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong passphrase, tampered ciphertext and malformed encodings all
    /// collapse into this variant so callers cannot tell them apart.
    #[error("Decryption failed: wrong passphrase or corrupted data")]
    DecryptionFailed,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
