// Warden — Vault data models
//
// `StoredCredential` is the persisted record. It holds the encrypted
// envelope only; plaintext never appears in this struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cipher::EncryptedEnvelope;

pub const CREDENTIAL_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub envelope: EncryptedEnvelope,
    #[serde(rename = "type")]
    pub type_label: String,
    /// Recorded so listing never has to split the storage key, whose parts
    /// may themselves contain dots.
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub account: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub schema_version: u32,
}

impl StoredCredential {
    /// False when the record names a different service or account than the
    /// one used to address it. Records without identity fields match.
    pub fn belongs_to(&self, service: &str, account: &str) -> bool {
        (self.service.is_empty() || self.service == service)
            && (self.account.is_empty() || self.account == account)
    }
}

/// Metadata view returned by `SecureStore::list`. Never decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub service: String,
    pub account: String,
    #[serde(rename = "type")]
    pub type_label: String,
    pub last_accessed: DateTime<Utc>,
}
