// Warden — Audit retention and alerting policy

use serde::{Deserialize, Serialize};

use super::AuditEventType;

/// Limits and thresholds applied by `AuditLog`. Loaded from the `[audit]`
/// section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditPolicy {
    /// Key under which the whole log is persisted.
    pub storage_key: String,
    /// Hard cap on retained entries, oldest dropped first.
    pub max_entries: usize,
    /// Entries older than this are dropped on every write.
    pub retention_days: i64,
    /// Retrievals within one hour above this count are flagged.
    pub retrieval_alert_threshold: usize,
    /// Operations considered sensitive. More failures within one hour than
    /// there are entries in this list is flagged as suspicious.
    pub sensitive_operations: Vec<AuditEventType>,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            storage_key: "warden-audit-log".to_string(),
            max_entries: 1000,
            retention_days: 90,
            retrieval_alert_threshold: 50,
            sensitive_operations: vec![
                AuditEventType::CredentialStore,
                AuditEventType::CredentialRetrieve,
                AuditEventType::CredentialDelete,
                AuditEventType::CredentialClear,
                AuditEventType::KeychainAccess,
            ],
        }
    }
}

impl AuditPolicy {
    /// Failure count above which the last hour is considered suspicious.
    pub fn failure_alert_threshold(&self) -> usize {
        self.sensitive_operations.len()
    }
}
