// Warden — Cipher Engine
//
// Every encryption call draws a fresh salt and IV, derives a 64-byte key
// block from the passphrase with PBKDF2-HMAC-SHA256, and splits it into an
// AES-256 key and an HMAC-SHA256 key. The MAC tag is appended to the CBC
// ciphertext (encrypt-then-MAC), so a wrong passphrase or a flipped bit is
// always reported as `DecryptionFailed` instead of producing garbage.
//
// Envelope fields are base64 text so they can live inside JSON blobs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::CipherError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// The only algorithm identifier this engine produces or accepts.
pub const ALGORITHM: &str = "aes-256-cbc-hmac-sha256";

/// PBKDF2 iteration count. Changing it breaks every existing envelope.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Default byte length for generated passwords and tokens.
pub const DEFAULT_RANDOM_BYTES: usize = 32;

/// 256-bit salt.
const SALT_LEN: usize = 32;

/// AES block-sized IV.
const IV_LEN: usize = 16;

const CIPHER_KEY_LEN: usize = 32;
const MAC_KEY_LEN: usize = 32;
const TAG_LEN: usize = 32;
const AES_BLOCK_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

// ─── Envelope ────────────────────────────────────────────────────────────────

/// Output of one `encrypt` call. Consumed only by `decrypt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Base64 of `ciphertext || tag`.
    #[serde(rename = "data")]
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
    #[serde(rename = "algorithm")]
    pub algorithm_id: String,
}

// ─── Key derivation ──────────────────────────────────────────────────────────

/// Derive the cipher key and MAC key from a passphrase. Both halves are
/// zeroized when the returned buffer is dropped.
fn derive_keys(password: &str, salt: &[u8]) -> Zeroizing<[u8; CIPHER_KEY_LEN + MAC_KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; CIPHER_KEY_LEN + MAC_KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut out[..]);
    out
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf
}

fn mac_for(mac_key: &[u8], salt: &[u8], iv: &[u8], ciphertext: &[u8]) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key).ok()?;
    mac.update(ALGORITHM.as_bytes());
    mac.update(salt);
    mac.update(iv);
    mac.update(ciphertext);
    Some(mac)
}

// ─── Encrypt / Decrypt ───────────────────────────────────────────────────────

/// Encrypt `plaintext` under `password`. Never deterministic: two calls with
/// identical inputs yield different salt, IV and ciphertext.
pub fn encrypt(plaintext: &str, password: &str) -> Result<EncryptedEnvelope, CipherError> {
    if plaintext.is_empty() {
        return Err(CipherError::InvalidInput("plaintext must not be empty"));
    }
    if password.is_empty() {
        return Err(CipherError::InvalidInput("password must not be empty"));
    }

    let salt = random_bytes(SALT_LEN);
    let iv = random_bytes(IV_LEN);
    let keys = derive_keys(password, &salt);
    let (cipher_key, mac_key) = keys.split_at(CIPHER_KEY_LEN);

    let mut sealed = Aes256CbcEnc::new_from_slices(cipher_key, &iv)
        .map_err(|e| CipherError::EncryptionFailed(format!("cipher init: {}", e)))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let tag = mac_for(mac_key, &salt, &iv, &sealed)
        .ok_or_else(|| CipherError::EncryptionFailed("mac init failed".to_string()))?
        .finalize()
        .into_bytes();
    sealed.extend_from_slice(&tag);

    Ok(EncryptedEnvelope {
        ciphertext: BASE64.encode(&sealed),
        iv: BASE64.encode(&iv),
        salt: BASE64.encode(&salt),
        algorithm_id: ALGORITHM.to_string(),
    })
}

/// Decrypt an envelope produced by `encrypt`.
///
/// The algorithm id is checked before any key derivation takes place.
pub fn decrypt(envelope: &EncryptedEnvelope, password: &str) -> Result<Zeroizing<String>, CipherError> {
    if envelope.algorithm_id != ALGORITHM {
        return Err(CipherError::UnsupportedAlgorithm(envelope.algorithm_id.clone()));
    }
    if password.is_empty() {
        return Err(CipherError::InvalidInput("password must not be empty"));
    }
    if envelope.ciphertext.is_empty() || envelope.iv.is_empty() || envelope.salt.is_empty() {
        return Err(CipherError::InvalidInput("envelope is missing fields"));
    }

    let sealed = BASE64
        .decode(&envelope.ciphertext)
        .map_err(|_| CipherError::DecryptionFailed)?;
    let iv = BASE64.decode(&envelope.iv).map_err(|_| CipherError::DecryptionFailed)?;
    let salt = BASE64.decode(&envelope.salt).map_err(|_| CipherError::DecryptionFailed)?;

    if iv.len() != IV_LEN || salt.len() != SALT_LEN || sealed.len() < AES_BLOCK_LEN + TAG_LEN {
        return Err(CipherError::DecryptionFailed);
    }

    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    let keys = derive_keys(password, &salt);
    let (cipher_key, mac_key) = keys.split_at(CIPHER_KEY_LEN);

    mac_for(mac_key, &salt, &iv, ciphertext)
        .ok_or(CipherError::DecryptionFailed)?
        .verify_slice(tag)
        .map_err(|_| CipherError::DecryptionFailed)?;

    let plain = Aes256CbcDec::new_from_slices(cipher_key, &iv)
        .map_err(|_| CipherError::DecryptionFailed)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::DecryptionFailed)?;

    String::from_utf8(plain)
        .map(Zeroizing::new)
        .map_err(|_| CipherError::DecryptionFailed)
}

/// Structural check: all fields populated and the algorithm is supported.
pub fn validate_envelope(envelope: &EncryptedEnvelope) -> bool {
    !envelope.ciphertext.is_empty()
        && !envelope.iv.is_empty()
        && !envelope.salt.is_empty()
        && envelope.algorithm_id == ALGORITHM
}

// ─── Random material ─────────────────────────────────────────────────────────

/// Base64 text of `byte_len` cryptographically secure random bytes.
pub fn generate_secure_password(byte_len: usize) -> String {
    BASE64.encode(random_bytes(byte_len))
}

/// Hex text of `byte_len` cryptographically secure random bytes.
pub fn generate_token(byte_len: usize) -> String {
    hex::encode(random_bytes(byte_len))
}

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// SHA-256 hex digest of `data`, with `salt` appended when given.
pub fn hash(data: &str, salt: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    if let Some(salt) = salt {
        hasher.update(salt.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Hash-then-compare. The salt must match the one used to produce `digest`.
pub fn verify_hash(data: &str, digest: &str, salt: Option<&str>) -> bool {
    secure_compare(&hash(data, salt), digest)
}

// ─── Constant-time comparison ────────────────────────────────────────────────

/// Compare two strings without short-circuiting on the first mismatch.
pub fn secure_compare(a: &str, b: &str) -> bool {
    compare_accumulate(a.as_bytes(), b.as_bytes()).0
}

/// Returns the comparison result and the number of byte positions visited.
/// Equal-length inputs always visit every position.
fn compare_accumulate(a: &[u8], b: &[u8]) -> (bool, usize) {
    if a.len() != b.len() {
        return (false, 0);
    }

    let mut diff = 0u8;
    let mut visited = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
        visited += 1;
    }
    (diff == 0, visited)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let envelope = encrypt("ntn_workspace_token_value", "correct horse").unwrap();
        let plain = decrypt(&envelope, "correct horse").unwrap();
        assert_eq!(plain.as_str(), "ntn_workspace_token_value");
    }

    #[test]
    fn test_roundtrip_preserves_unicode() {
        let secret = "pässwörd-🔑-秘密";
        let envelope = encrypt(secret, "pw").unwrap();
        assert_eq!(decrypt(&envelope, "pw").unwrap().as_str(), secret);
    }

    #[test]
    fn test_encrypt_is_not_deterministic() {
        let a = encrypt("same plaintext", "same password").unwrap();
        let b = encrypt("same plaintext", "same password").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext, "ciphertext must differ across calls");
        assert_ne!(a.iv, b.iv, "IV must be fresh per call");
        assert_ne!(a.salt, b.salt, "salt must be fresh per call");
    }

    #[test]
    fn test_envelope_carries_expected_lengths() {
        let envelope = encrypt("x", "pw").unwrap();
        assert_eq!(BASE64.decode(&envelope.salt).unwrap().len(), SALT_LEN);
        assert_eq!(BASE64.decode(&envelope.iv).unwrap().len(), IV_LEN);
        // one padded block plus the MAC tag
        assert_eq!(
            BASE64.decode(&envelope.ciphertext).unwrap().len(),
            AES_BLOCK_LEN + TAG_LEN
        );
        assert_eq!(envelope.algorithm_id, ALGORITHM);
    }

    #[test]
    fn test_encrypt_rejects_empty_inputs() {
        assert!(matches!(encrypt("", "pw"), Err(CipherError::InvalidInput(_))));
        assert!(matches!(encrypt("data", ""), Err(CipherError::InvalidInput(_))));
    }

    #[test]
    fn test_wrong_password_fails_with_decryption_failed() {
        let envelope = encrypt("top secret", "pw-one").unwrap();
        let err = decrypt(&envelope, "pw-two").unwrap_err();
        assert_eq!(err, CipherError::DecryptionFailed);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut envelope = encrypt("top secret", "pw").unwrap();
        let mut raw = BASE64.decode(&envelope.ciphertext).unwrap();
        raw[0] ^= 0x01;
        envelope.ciphertext = BASE64.encode(&raw);
        assert_eq!(decrypt(&envelope, "pw").unwrap_err(), CipherError::DecryptionFailed);
    }

    #[test]
    fn test_tampered_iv_fails() {
        let mut envelope = encrypt("top secret", "pw").unwrap();
        let mut iv = BASE64.decode(&envelope.iv).unwrap();
        iv[3] ^= 0xff;
        envelope.iv = BASE64.encode(&iv);
        assert_eq!(decrypt(&envelope, "pw").unwrap_err(), CipherError::DecryptionFailed);
    }

    #[test]
    fn test_garbage_encoding_fails_without_leaking_details() {
        let mut envelope = encrypt("top secret", "pw").unwrap();
        envelope.ciphertext = "%%%not-base64%%%".to_string();
        let err = decrypt(&envelope, "pw").unwrap_err();
        assert_eq!(err, CipherError::DecryptionFailed);
        assert!(!err.to_string().contains(&envelope.salt));
    }

    #[test]
    fn test_unsupported_algorithm_rejected_first() {
        let mut envelope = encrypt("top secret", "pw").unwrap();
        envelope.algorithm_id = "aes-256-gcm".to_string();
        // salt is garbage too: the algorithm check must win before any decoding
        envelope.salt = "!!".to_string();
        assert_eq!(
            decrypt(&envelope, "anything").unwrap_err(),
            CipherError::UnsupportedAlgorithm("aes-256-gcm".to_string())
        );
    }

    #[test]
    fn test_decrypt_rejects_empty_password() {
        let envelope = encrypt("top secret", "pw").unwrap();
        assert!(matches!(decrypt(&envelope, ""), Err(CipherError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_envelope() {
        let envelope = encrypt("value", "pw").unwrap();
        assert!(validate_envelope(&envelope));

        let mut missing_iv = envelope.clone();
        missing_iv.iv.clear();
        assert!(!validate_envelope(&missing_iv));

        let mut foreign = envelope;
        foreign.algorithm_id = "rot13".to_string();
        assert!(!validate_envelope(&foreign));
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = encrypt("value", "pw").unwrap();
        let json: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        for field in ["data", "iv", "salt", "algorithm"] {
            assert!(json.get(field).is_some(), "envelope JSON must carry '{}'", field);
        }
    }

    #[test]
    fn test_generate_secure_password_differs() {
        let a = generate_secure_password(DEFAULT_RANDOM_BYTES);
        let b = generate_secure_password(DEFAULT_RANDOM_BYTES);
        assert_ne!(a, b);
        assert_eq!(BASE64.decode(&a).unwrap().len(), DEFAULT_RANDOM_BYTES);
    }

    #[test]
    fn test_generate_token_is_hex() {
        let token = generate_token(16);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token(16));
    }

    #[test]
    fn test_hash_properties() {
        assert_eq!(hash("data", Some("s1")), hash("data", Some("s1")));
        assert_ne!(hash("data", Some("s1")), hash("data", Some("s2")));
        assert_ne!(hash("data", None), hash("data", Some("s1")));
        assert_eq!(hash("data", None).len(), 64, "SHA-256 hex digest is 64 chars");
    }

    #[test]
    fn test_verify_hash_requires_same_salt() {
        let digest = hash("data", Some("salt"));
        assert!(verify_hash("data", &digest, Some("salt")));
        assert!(!verify_hash("data", &digest, None));
        assert!(!verify_hash("other", &digest, Some("salt")));
    }

    #[test]
    fn test_secure_compare_basics() {
        assert!(secure_compare("", ""));
        assert!(secure_compare("abc", "abc"));
        assert!(!secure_compare("abc", "abcd"));
        assert!(!secure_compare("abc", "abd"));
    }

    #[test]
    fn test_secure_compare_visits_every_position() {
        let base = "a".repeat(64);
        let mut early = base.clone().into_bytes();
        early[0] = b'b';
        let mut late = base.clone().into_bytes();
        late[63] = b'b';

        let (eq_early, visits_early) = compare_accumulate(base.as_bytes(), &early);
        let (eq_late, visits_late) = compare_accumulate(base.as_bytes(), &late);
        assert!(!eq_early && !eq_late);
        assert_eq!(visits_early, 64);
        assert_eq!(visits_late, 64, "iteration count must not depend on mismatch position");
    }

    #[test]
    fn test_secure_compare_length_mismatch_skips_loop() {
        assert_eq!(compare_accumulate(b"short", b"longer-input"), (false, 0));
    }
}
