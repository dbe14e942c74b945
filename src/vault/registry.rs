// Warden — Credential type registry
//
// Static descriptors for the credential kinds the application knows about.
// Used to label stored credentials and to check the format of known kinds.
// Lookups go through a service index; within one service, descriptors keep
// their registration order and the first match wins.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Label used when no descriptor matches.
pub const GENERIC_CREDENTIAL_LABEL: &str = "Generic Credential";

// ─── Classification ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataClassification {
    Public,
    Internal,
    Confidential,
    Restricted,
}

/// How much detail audit entries for a classification should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditDetail {
    Minimal,
    Standard,
    Detailed,
}

impl DataClassification {
    pub fn requires_encryption(&self) -> bool {
        matches!(self, Self::Confidential | Self::Restricted)
    }

    pub fn requires_keychain(&self) -> bool {
        matches!(self, Self::Restricted)
    }

    pub fn audit_detail(&self) -> AuditDetail {
        match self {
            Self::Public => AuditDetail::Minimal,
            Self::Internal => AuditDetail::Standard,
            Self::Confidential | Self::Restricted => AuditDetail::Detailed,
        }
    }
}

// ─── Descriptors ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CredentialTypeDescriptor {
    pub name: String,
    pub classification: DataClassification,
    pub service: String,
    pub account: String,
    pub description: String,
    pub validation_pattern: Option<Regex>,
}

impl CredentialTypeDescriptor {
    pub fn new(
        name: &str,
        classification: DataClassification,
        service: &str,
        account: &str,
        description: &str,
        validation_pattern: Option<&str>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.to_string(),
            classification,
            service: service.to_string(),
            account: account.to_string(),
            description: description.to_string(),
            validation_pattern: validation_pattern.map(Regex::new).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialRegistry {
    descriptors: Vec<CredentialTypeDescriptor>,
    by_service: HashMap<String, Vec<usize>>,
}

impl CredentialRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the application's known credential kinds.
    pub fn builtin() -> Self {
        use DataClassification::*;

        let specs: [(&str, DataClassification, &str, &str, &str, Option<&str>); 6] = [
            (
                "Notion Integration Token",
                Restricted,
                "notion",
                "integration-token",
                "Internal integration secret for the Notion workspace",
                Some(r"^(secret_|ntn_)[A-Za-z0-9]{20,}$"),
            ),
            (
                "Banking API Key",
                Restricted,
                "banking",
                "api-key",
                "Read-only key for the banking aggregation API",
                Some(r"^[A-Za-z0-9_-]{32,}$"),
            ),
            (
                "Health Data Token",
                Restricted,
                "health",
                "access-token",
                "OAuth access token for the health data provider",
                Some(r"^[A-Za-z0-9._-]{20,}$"),
            ),
            (
                "GitHub Personal Access Token",
                Confidential,
                "github",
                "personal-access-token",
                "Token used to sync issues and repositories",
                Some(r"^(ghp_[A-Za-z0-9]{36}|github_pat_[A-Za-z0-9_]{22,})$"),
            ),
            (
                "OpenAI API Key",
                Confidential,
                "openai",
                "api-key",
                "Key for summarisation requests",
                Some(r"^sk-[A-Za-z0-9_-]{20,}$"),
            ),
            (
                "Master Passphrase",
                Restricted,
                "warden",
                "master-passphrase",
                "Passphrase protecting the encrypted local store",
                None,
            ),
        ];

        let mut registry = Self::empty();
        for (name, class, service, account, description, pattern) in specs {
            let descriptor =
                CredentialTypeDescriptor::new(name, class, service, account, description, pattern)
                    .expect("builtin credential patterns are valid regexes");
            registry.register(descriptor);
        }
        registry
    }

    pub fn register(&mut self, descriptor: CredentialTypeDescriptor) {
        let index = self.descriptors.len();
        self.by_service
            .entry(descriptor.service.clone())
            .or_default()
            .push(index);
        self.descriptors.push(descriptor);
    }

    pub fn descriptors(&self) -> &[CredentialTypeDescriptor] {
        &self.descriptors
    }

    /// Exact (service, account) match, else the first descriptor registered
    /// for the service.
    pub fn lookup(&self, service: &str, account: &str) -> Option<&CredentialTypeDescriptor> {
        let candidates = self.by_service.get(service)?;
        candidates
            .iter()
            .map(|&i| &self.descriptors[i])
            .find(|d| d.account == account)
            .or_else(|| candidates.first().map(|&i| &self.descriptors[i]))
    }

    pub fn infer_label(&self, service: &str, account: &str) -> String {
        self.lookup(service, account)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| GENERIC_CREDENTIAL_LABEL.to_string())
    }

    /// `None` when the kind is unknown or has no pattern.
    pub fn validate_format(&self, service: &str, account: &str, value: &str) -> Option<bool> {
        self.lookup(service, account)?
            .validation_pattern
            .as_ref()
            .map(|p| p.is_match(value))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_policy() {
        assert!(!DataClassification::Public.requires_encryption());
        assert!(!DataClassification::Internal.requires_encryption());
        assert!(DataClassification::Confidential.requires_encryption());
        assert!(DataClassification::Restricted.requires_encryption());
        assert!(DataClassification::Restricted.requires_keychain());
        assert!(!DataClassification::Confidential.requires_keychain());
        assert_eq!(DataClassification::Public.audit_detail(), AuditDetail::Minimal);
        assert_eq!(DataClassification::Restricted.audit_detail(), AuditDetail::Detailed);
    }

    #[test]
    fn test_infer_label_known_and_unknown() {
        let registry = CredentialRegistry::builtin();
        assert_eq!(
            registry.infer_label("notion", "integration-token"),
            "Notion Integration Token"
        );
        assert_eq!(registry.infer_label("svc", "acct"), GENERIC_CREDENTIAL_LABEL);
    }

    #[test]
    fn test_service_match_falls_back_to_first_registered() {
        let mut registry = CredentialRegistry::empty();
        registry.register(
            CredentialTypeDescriptor::new("First", DataClassification::Internal, "shared", "a", "", None)
                .unwrap(),
        );
        registry.register(
            CredentialTypeDescriptor::new("Second", DataClassification::Internal, "shared", "b", "", None)
                .unwrap(),
        );

        assert_eq!(registry.infer_label("shared", "b"), "Second", "exact account match wins");
        assert_eq!(registry.infer_label("shared", "zzz"), "First", "first registered wins otherwise");
    }

    #[test]
    fn test_validate_format() {
        let registry = CredentialRegistry::builtin();
        assert_eq!(
            registry.validate_format("openai", "api-key", "sk-abcdefghijklmnopqrstuvwx"),
            Some(true)
        );
        assert_eq!(registry.validate_format("openai", "api-key", "not-a-key"), Some(false));
        assert_eq!(registry.validate_format("warden", "master-passphrase", "anything"), None);
        assert_eq!(registry.validate_format("unknown", "acct", "anything"), None);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result =
            CredentialTypeDescriptor::new("Bad", DataClassification::Public, "s", "a", "", Some("("));
        assert!(result.is_err());
    }

    #[test]
    fn test_builtin_services_fit_identifier_rules() {
        for d in CredentialRegistry::builtin().descriptors() {
            assert!(
                d.service.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c)),
                "builtin service '{}' must be storable",
                d.service
            );
        }
    }
}
