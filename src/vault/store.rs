// Warden — Secure Store
//
// Credentials live under `<namespace>.<service>.<account>` as JSON
// `StoredCredential` records. The master passphrase is fixed for the
// lifetime of a `SecureStore`. With `PassphraseSource::Ephemeral` it is
// generated at construction and never persisted, so records written by one
// process cannot be decrypted by the next.
//
// Encrypt-then-persist and decrypt-then-touch are two separate steps. A
// crash between them can leave `lastAccessedAt` stale but never corrupts
// the envelope.
//
// Deleting a credential that does not exist is an error here, unlike the
// keychain adapter where delete is idempotent.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use regex::Regex;
use serde_json::json;
use zeroize::Zeroizing;

use super::models::{CredentialSummary, StoredCredential, CREDENTIAL_SCHEMA_VERSION};
use super::registry::CredentialRegistry;
use super::VaultError;
use crate::audit::{AuditEventType, AuditLog, AuditResult};
use crate::cipher::{self, CipherError, EncryptedEnvelope};
use crate::kv::KeyValueStore;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Minimum credential length accepted by `store`.
pub const MIN_CREDENTIAL_LEN: usize = 8;

const MAX_IDENTIFIER_LEN: usize = 100;

/// Where the master passphrase comes from.
pub enum PassphraseSource {
    /// Fresh random passphrase per process; stored data does not survive a
    /// restart.
    Ephemeral,
    /// Caller-managed passphrase, e.g. kept in the platform keychain.
    Supplied(Zeroizing<String>),
}

impl std::fmt::Debug for PassphraseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ephemeral => f.write_str("Ephemeral"),
            Self::Supplied(_) => f.write_str("Supplied([REDACTED])"),
        }
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9._-]+$").expect("identifier pattern is a valid regex")
    })
}

pub struct SecureStore {
    kv: Arc<dyn KeyValueStore>,
    audit: Arc<AuditLog>,
    registry: CredentialRegistry,
    namespace: String,
    passphrase: Zeroizing<String>,
}

impl SecureStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        audit: Arc<AuditLog>,
        namespace: impl Into<String>,
        source: PassphraseSource,
    ) -> Self {
        let passphrase = match source {
            PassphraseSource::Ephemeral => {
                tracing::debug!("Generated ephemeral master passphrase for this process");
                Zeroizing::new(cipher::generate_secure_password(cipher::DEFAULT_RANDOM_BYTES))
            }
            PassphraseSource::Supplied(p) => p,
        };

        Self {
            kv,
            audit,
            registry: CredentialRegistry::builtin(),
            namespace: namespace.into(),
            passphrase,
        }
    }

    pub fn with_registry(mut self, registry: CredentialRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    pub fn storage_key(&self, service: &str, account: &str) -> String {
        format!("{}.{}.{}", self.namespace, service, account)
    }

    fn key_prefix(&self) -> String {
        format!("{}.", self.namespace)
    }

    // ─── Validation ──────────────────────────────────────────────────────────

    fn check_identifier(label: &str, value: &str, violations: &mut Vec<String>) {
        if value.is_empty() || value.len() > MAX_IDENTIFIER_LEN || !identifier_pattern().is_match(value) {
            violations.push(format!(
                "{} must be 1-{} characters of lowercase letters, digits, '.', '_' or '-'",
                label, MAX_IDENTIFIER_LEN
            ));
        }
    }

    async fn validate_identifiers(&self, service: &str, account: &str) -> Result<(), VaultError> {
        let mut violations = Vec::new();
        Self::check_identifier("service", service, &mut violations);
        Self::check_identifier("account", account, &mut violations);
        self.reject_violations(violations).await
    }

    async fn reject_violations(&self, violations: Vec<String>) -> Result<(), VaultError> {
        if violations.is_empty() {
            return Ok(());
        }
        self.audit
            .log(
                AuditEventType::ValidationFailure,
                AuditResult::Failed,
                json!({ "violations": violations }),
            )
            .await;
        Err(VaultError::ValidationFailed(violations))
    }

    // ─── Cipher helpers ──────────────────────────────────────────────────────

    /// PBKDF2 is deliberately slow; keep it off the async worker threads.
    async fn seal(&self, plaintext: &str) -> Result<EncryptedEnvelope, CipherError> {
        let plaintext = Zeroizing::new(plaintext.to_string());
        let passphrase = self.passphrase.clone();
        tokio::task::spawn_blocking(move || cipher::encrypt(&plaintext, &passphrase))
            .await
            .map_err(|e| CipherError::EncryptionFailed(format!("encryption task failed: {}", e)))?
    }

    async fn open(&self, envelope: EncryptedEnvelope) -> Result<Zeroizing<String>, CipherError> {
        let passphrase = self.passphrase.clone();
        tokio::task::spawn_blocking(move || cipher::decrypt(&envelope, &passphrase))
            .await
            .map_err(|_| CipherError::DecryptionFailed)?
    }

    async fn fail(&self, event_type: AuditEventType, service: &str, account: &str, reason: &str) {
        tracing::warn!(service = %service, account = %account, reason, "Credential operation failed");
        self.audit
            .log(
                event_type,
                AuditResult::Failed,
                json!({ "service": service, "account": account, "reason": reason }),
            )
            .await;
    }

    // ─── Operations ──────────────────────────────────────────────────────────

    /// Encrypt and persist `credential`, replacing any existing record.
    pub async fn store(&self, service: &str, account: &str, credential: &str) -> Result<(), VaultError> {
        let mut violations = Vec::new();
        Self::check_identifier("service", service, &mut violations);
        Self::check_identifier("account", account, &mut violations);
        if credential.chars().count() < MIN_CREDENTIAL_LEN {
            violations.push(format!(
                "credential must be at least {} characters",
                MIN_CREDENTIAL_LEN
            ));
        }
        self.reject_violations(violations).await?;

        let key = self.storage_key(service, account);
        let existing = match self.kv.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str::<StoredCredential>(&raw).ok(),
            _ => None,
        };
        if existing.as_ref().is_some_and(|e| !e.belongs_to(service, account)) {
            self.fail(AuditEventType::CredentialStore, service, account, "key held by another credential")
                .await;
            return Err(VaultError::StoreFailed(
                "storage key is already used by a different service/account".to_string(),
            ));
        }

        let envelope = match self.seal(credential).await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.fail(AuditEventType::CredentialStore, service, account, &e.to_string())
                    .await;
                return Err(VaultError::StoreFailed(e.to_string()));
            }
        };

        let now = Utc::now();
        let created_at = existing.map_or(now, |e| e.created_at);

        let record = StoredCredential {
            envelope,
            type_label: self.registry.infer_label(service, account),
            service: service.to_string(),
            account: account.to_string(),
            created_at,
            last_accessed_at: now,
            schema_version: CREDENTIAL_SCHEMA_VERSION,
        };

        let persisted = match serde_json::to_string(&record) {
            Ok(blob) => self.kv.set(&key, &blob).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = persisted {
            self.fail(AuditEventType::CredentialStore, service, account, &reason)
                .await;
            return Err(VaultError::StoreFailed(reason));
        }

        self.audit
            .log(
                AuditEventType::CredentialStore,
                AuditResult::Success,
                json!({ "service": service, "account": account, "kind": record.type_label }),
            )
            .await;
        tracing::info!(service = %service, account = %account, "Credential stored");
        Ok(())
    }

    /// Decrypt and return a credential, refreshing its `lastAccessedAt`.
    pub async fn retrieve(&self, service: &str, account: &str) -> Result<Zeroizing<String>, VaultError> {
        self.validate_identifiers(service, account).await?;
        let key = self.storage_key(service, account);

        let raw = match self.kv.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.fail(AuditEventType::CredentialRetrieve, service, account, "not found")
                    .await;
                return Err(VaultError::RetrieveFailed("credential not found"));
            }
            Err(e) => {
                self.fail(AuditEventType::CredentialRetrieve, service, account, &e.to_string())
                    .await;
                return Err(VaultError::RetrieveFailed("storage unavailable"));
            }
        };

        let mut record: StoredCredential = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(_) => {
                self.fail(AuditEventType::CredentialRetrieve, service, account, "corrupt record")
                    .await;
                return Err(VaultError::RetrieveFailed("stored record is corrupted"));
            }
        };

        // Dotted identifiers can collide on one key; never hand out another
        // credential's value.
        if !record.belongs_to(service, account) {
            self.fail(AuditEventType::CredentialRetrieve, service, account, "not found")
                .await;
            return Err(VaultError::RetrieveFailed("credential not found"));
        }

        let plaintext = match self.open(record.envelope.clone()).await {
            Ok(plaintext) => plaintext,
            Err(e) => {
                self.fail(AuditEventType::DecryptionOperation, service, account, &e.to_string())
                    .await;
                return Err(VaultError::RetrieveFailed("decryption failed"));
            }
        };

        record.last_accessed_at = Utc::now();
        match serde_json::to_string(&record) {
            Ok(blob) => {
                if let Err(e) = self.kv.set(&key, &blob).await {
                    tracing::warn!(error = %e, "Failed to update last-accessed time");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize credential record"),
        }

        self.audit
            .log(
                AuditEventType::CredentialRetrieve,
                AuditResult::Success,
                json!({ "service": service, "account": account }),
            )
            .await;
        tracing::debug!(service = %service, account = %account, "Credential retrieved");
        Ok(plaintext)
    }

    /// Remove a credential. A missing credential is `VaultError::NotFound`.
    pub async fn delete(&self, service: &str, account: &str) -> Result<(), VaultError> {
        self.validate_identifiers(service, account).await?;
        let key = self.storage_key(service, account);

        let exists = match self.kv.get(&key).await {
            // Unparseable records stay deletable.
            Ok(found) => found.is_some_and(|raw| {
                serde_json::from_str::<StoredCredential>(&raw)
                    .map_or(true, |record| record.belongs_to(service, account))
            }),
            Err(e) => {
                self.fail(AuditEventType::CredentialDelete, service, account, &e.to_string())
                    .await;
                return Err(VaultError::Storage(e));
            }
        };
        if !exists {
            self.fail(AuditEventType::CredentialDelete, service, account, "not found")
                .await;
            return Err(VaultError::NotFound);
        }

        if let Err(e) = self.kv.remove(&key).await {
            self.fail(AuditEventType::CredentialDelete, service, account, &e.to_string())
                .await;
            return Err(VaultError::Storage(e));
        }

        self.audit
            .log(
                AuditEventType::CredentialDelete,
                AuditResult::Success,
                json!({ "service": service, "account": account }),
            )
            .await;
        tracing::info!(service = %service, account = %account, "Credential deleted");
        Ok(())
    }

    /// Metadata for every record under this store's namespace. Records that
    /// fail to parse are skipped.
    pub async fn list(&self) -> Result<Vec<CredentialSummary>, VaultError> {
        let prefix = self.key_prefix();
        let summaries = self
            .kv
            .list_all()
            .await?
            .into_iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, raw)| {
                let record: StoredCredential = serde_json::from_str(&raw).ok()?;
                let (service, account) = if record.service.is_empty() {
                    let rest = key.strip_prefix(&prefix)?;
                    let (s, a) = rest.split_once('.')?;
                    (s.to_string(), a.to_string())
                } else {
                    (record.service, record.account)
                };
                Some(CredentialSummary {
                    service,
                    account,
                    type_label: record.type_label,
                    last_accessed: record.last_accessed_at,
                })
            })
            .collect();
        Ok(summaries)
    }

    /// Remove every key under the namespace. Returns the number removed.
    pub async fn clear_all(&self) -> Result<usize, VaultError> {
        let prefix = self.key_prefix();
        let keys: Vec<String> = self
            .kv
            .list_all()
            .await?
            .into_keys()
            .filter(|k| k.starts_with(&prefix))
            .collect();

        let mut removed = 0;
        let mut first_error = None;
        for key in &keys {
            match self.kv.remove(key).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to remove credential during clear");
                    first_error.get_or_insert(e);
                }
            }
        }

        let result = if first_error.is_some() { AuditResult::Failed } else { AuditResult::Success };
        self.audit
            .log(
                AuditEventType::CredentialClear,
                result,
                json!({ "removed": removed, "total": keys.len() }),
            )
            .await;

        match first_error {
            Some(e) => Err(VaultError::Storage(e)),
            None => {
                tracing::info!(removed, "Cleared encrypted credential store");
                Ok(removed)
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
