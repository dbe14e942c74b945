// Warden — Cipher Module
//
// Stateless cryptographic primitives: PBKDF2 key derivation, AES-256-CBC
// encryption authenticated with HMAC-SHA256, secure random generation,
// salted hashing and constant-time comparison.

mod engine;
mod error;

pub use engine::{
    decrypt, encrypt, generate_secure_password, generate_token, hash, secure_compare,
    validate_envelope, verify_hash, EncryptedEnvelope, ALGORITHM, DEFAULT_RANDOM_BYTES,
    KDF_ITERATIONS,
};
pub use error::CipherError;
