// Warden — Audit data models

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bumped when the persisted entry shape changes.
pub const AUDIT_SCHEMA_VERSION: u32 = 1;

/// Default `limit` for `AuditQuery`.
const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    CredentialStore,
    CredentialRetrieve,
    CredentialDelete,
    CredentialClear,
    KeychainAccess,
    EncryptionOperation,
    DecryptionOperation,
    ValidationFailure,
    UnauthorizedAccess,
    ConfigChanged,
    EnvironmentCheck,
    SessionStart,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialStore => "CREDENTIAL_STORE",
            Self::CredentialRetrieve => "CREDENTIAL_RETRIEVE",
            Self::CredentialDelete => "CREDENTIAL_DELETE",
            Self::CredentialClear => "CREDENTIAL_CLEAR",
            Self::KeychainAccess => "KEYCHAIN_ACCESS",
            Self::EncryptionOperation => "ENCRYPTION_OPERATION",
            Self::DecryptionOperation => "DECRYPTION_OPERATION",
            Self::ValidationFailure => "VALIDATION_FAILURE",
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::ConfigChanged => "CONFIG_CHANGED",
            Self::EnvironmentCheck => "ENVIRONMENT_CHECK",
            Self::SessionStart => "SESSION_START",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditResult {
    Success,
    Failed,
    Warning,
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Warning => "WARNING",
        })
    }
}

/// One immutable audit record. `data` is already redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub result: AuditResult,
    pub data: Map<String, Value>,
    pub session_id: String,
    pub schema_version: u32,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.event_type,
            self.result
        )?;
        if !self.data.is_empty() {
            write!(f, " {}", Value::Object(self.data.clone()))?;
        }
        Ok(())
    }
}

/// Filters are AND-combined; `None` means unconstrained.
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub event_type: Option<AuditEventType>,
    pub result: Option<AuditResult>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            event_type: None,
            result: None,
            after: None,
            before: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.event_type.map_or(true, |t| entry.event_type == t)
            && self.result.map_or(true, |r| entry.result == r)
            && self.after.map_or(true, |after| entry.timestamp > after)
            && self.before.map_or(true, |before| entry.timestamp < before)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: usize,
    pub by_result: BTreeMap<AuditResult, usize>,
    pub by_event_type: BTreeMap<AuditEventType, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousActivityReport {
    pub has_issues: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(event_type: AuditEventType, result: AuditResult, at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id: "id".to_string(),
            timestamp: at,
            event_type,
            result,
            data: Map::new(),
            session_id: "session".to_string(),
            schema_version: AUDIT_SCHEMA_VERSION,
        }
    }

    #[test]
    fn test_event_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&AuditEventType::ConfigChanged).unwrap();
        assert_eq!(json, "\"CONFIG_CHANGED\"");
        assert_eq!(AuditEventType::ConfigChanged.to_string(), "CONFIG_CHANGED");
    }

    #[test]
    fn test_entry_json_uses_camel_case() {
        let e = entry(AuditEventType::CredentialStore, AuditResult::Success, Utc::now());
        let json = serde_json::to_value(&e).unwrap();
        assert!(json.get("eventType").is_some());
        assert!(json.get("sessionId").is_some());
        assert!(json.get("schemaVersion").is_some());
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let q = AuditQuery::default();
        assert_eq!(q.limit, 100);
        assert!(q.matches(&entry(AuditEventType::SessionStart, AuditResult::Warning, Utc::now())));
    }

    #[test]
    fn test_query_filters_are_and_combined() {
        let now = Utc::now();
        let q = AuditQuery {
            event_type: Some(AuditEventType::CredentialRetrieve),
            result: Some(AuditResult::Failed),
            after: Some(now - Duration::hours(1)),
            ..Default::default()
        };

        assert!(q.matches(&entry(AuditEventType::CredentialRetrieve, AuditResult::Failed, now)));
        assert!(!q.matches(&entry(AuditEventType::CredentialRetrieve, AuditResult::Success, now)));
        assert!(!q.matches(&entry(AuditEventType::CredentialStore, AuditResult::Failed, now)));
        assert!(!q.matches(&entry(
            AuditEventType::CredentialRetrieve,
            AuditResult::Failed,
            now - Duration::hours(2)
        )));
    }

    #[test]
    fn test_stats_serialize_with_enum_keys() {
        let mut stats = AuditStats::default();
        stats.by_result.insert(AuditResult::Failed, 2);
        stats.by_event_type.insert(AuditEventType::KeychainAccess, 1);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["byResult"]["FAILED"], 2);
        assert_eq!(json["byEventType"]["KEYCHAIN_ACCESS"], 1);
    }
}
