// Warden — Keychain Adapter
//
// One generic password per (service, account). Semantics:
//   - store overwrites: any existing entry is deleted first
//   - delete is idempotent: a missing entry counts as deleted
//   - list is diagnostic: failures yield an empty list, never an error
//
// Every operation, including one rejected by input validation, emits a
// debug-level trace on `warden::security` and, when an audit log is
// attached, a KEYCHAIN_ACCESS audit entry.
//
// Arguments go to the subprocess as argv, never through a shell. The
// `security` CLI only accepts the secret as the `-w` argument, so it is
// visible to other local users (e.g. `ps`) while the subprocess runs.
//
// Only services under `<namespace>.` belong to this application. Entries
// registered with `protect` are listed but never bulk-deleted.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use serde_json::json;
use zeroize::Zeroizing;

use super::runner::{CommandRunner, SecurityCli};
use super::KeychainError;
use crate::audit::{AuditEventType, AuditLog, AuditResult};

// ─── Constants ───────────────────────────────────────────────────────────────

const MAX_IDENTIFIER_LEN: usize = 255;
const MAX_SECRET_LEN: usize = 4096;

/// A `(service, account)` pair found in the platform store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeychainEntry {
    pub service: String,
    pub account: String,
}

pub struct KeychainAdapter<R: CommandRunner = SecurityCli> {
    runner: R,
    namespace: String,
    audit: Option<Arc<AuditLog>>,
    protected: Vec<KeychainEntry>,
}

impl KeychainAdapter<SecurityCli> {
    /// Adapter over the system `security` binary. `namespace` is the service
    /// prefix used to recognise this application's entries when listing.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_runner(SecurityCli::new(), namespace)
    }
}

impl<R: CommandRunner> KeychainAdapter<R> {
    pub fn with_runner(runner: R, namespace: impl Into<String>) -> Self {
        Self {
            runner,
            namespace: namespace.into(),
            audit: None,
            protected: Vec::new(),
        }
    }

    /// Exclude `(service, account)` from `clear_all_credentials`.
    pub fn protect(mut self, service: impl Into<String>, account: impl Into<String>) -> Self {
        self.protected.push(KeychainEntry {
            service: service.into(),
            account: account.into(),
        });
        self
    }

    fn in_namespace(&self, service: &str) -> bool {
        service
            .strip_prefix(self.namespace.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Mirror every operation into `audit`.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    // ─── Validation ──────────────────────────────────────────────────────────

    /// Allow-list for values placed on the credential manager's argv.
    fn validate_identifier(label: &str, value: &str) -> Result<(), KeychainError> {
        if value.is_empty() {
            return Err(KeychainError::InvalidInput(format!("{} must not be empty", label)));
        }
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(KeychainError::InvalidInput(format!(
                "{} must be at most {} characters",
                label, MAX_IDENTIFIER_LEN
            )));
        }
        let mut chars = value.chars();
        let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'));
        if !first_ok || !rest_ok {
            return Err(KeychainError::InvalidInput(format!(
                "{} may contain only letters, digits, '.', '_', '-' and '@', and must start with a letter or digit",
                label
            )));
        }
        Ok(())
    }

    fn validate_secret(secret: &str) -> Result<(), KeychainError> {
        if secret.is_empty() {
            return Err(KeychainError::InvalidInput("secret must not be empty".to_string()));
        }
        if secret.len() > MAX_SECRET_LEN {
            return Err(KeychainError::InvalidInput(format!(
                "secret must be at most {} bytes",
                MAX_SECRET_LEN
            )));
        }
        if secret.chars().any(char::is_control) {
            return Err(KeychainError::InvalidInput(
                "secret must not contain control characters".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Tracing ─────────────────────────────────────────────────────────────

    async fn trace(&self, operation: &str, service: &str, account: &str, outcome: Result<(), &KeychainError>) {
        let service = strip_quotes(service);
        let account = strip_quotes(account);
        let success = outcome.is_ok();

        tracing::debug!(
            target: "warden::security",
            operation,
            service = %service,
            account = %account,
            success,
            "Keychain operation"
        );

        if let Some(audit) = &self.audit {
            let mut data = json!({
                "operation": operation,
                "service": service,
                "account": account,
            });
            if let Err(e) = outcome {
                data["error"] = json!(e.to_string());
            }
            let result = if success { AuditResult::Success } else { AuditResult::Failed };
            audit.log(AuditEventType::KeychainAccess, result, data).await;
        }
    }

    /// Trace a validation failure before handing it back to the caller.
    async fn checked(
        &self,
        operation: &str,
        service: &str,
        account: &str,
        validation: Result<(), KeychainError>,
    ) -> Result<(), KeychainError> {
        if let Err(e) = &validation {
            self.trace(operation, service, account, Err(e)).await;
        }
        validation
    }

    // ─── Operations ──────────────────────────────────────────────────────────

    async fn add(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        let output = self
            .runner
            .run(&["add-generic-password", "-s", service, "-a", account, "-w", secret, "-U"])
            .await?;
        if output.success() {
            Ok(())
        } else {
            Err(KeychainError::StoreFailed(output.reason()))
        }
    }

    async fn remove(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        let output = self
            .runner
            .run(&["delete-generic-password", "-s", service, "-a", account])
            .await?;
        if output.success() || output.is_not_found() {
            Ok(())
        } else {
            Err(KeychainError::StoreFailed(output.reason()))
        }
    }

    /// Store `secret`, replacing any existing entry for the pair.
    pub async fn store(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        let validation = Self::validate_identifier("service", service)
            .and_then(|_| Self::validate_identifier("account", account))
            .and_then(|_| Self::validate_secret(secret));
        self.checked("store", service, account, validation).await?;

        if let Err(e) = self.remove(service, account).await {
            tracing::debug!(error = %e, "Pre-store delete failed; continuing with overwrite");
        }
        let result = self.add(service, account, secret).await;

        self.trace("store", service, account, result.as_ref().map(|_| ())).await;
        if result.is_ok() {
            tracing::info!(service = %service, account = %account, "Secret stored in keychain");
        }
        result
    }

    /// Fetch the secret. A missing entry is `KeychainError::NotFound`.
    pub async fn retrieve(&self, service: &str, account: &str) -> Result<Zeroizing<String>, KeychainError> {
        let validation = Self::validate_identifier("service", service)
            .and_then(|_| Self::validate_identifier("account", account));
        self.checked("retrieve", service, account, validation).await?;

        let result = match self
            .runner
            .run(&["find-generic-password", "-s", service, "-a", account, "-w"])
            .await
        {
            Ok(output) if output.success() => {
                let stdout = Zeroizing::new(output.stdout);
                Ok(Zeroizing::new(stdout.trim_end_matches(&['\r', '\n'][..]).to_string()))
            }
            Ok(output) if output.is_not_found() => Err(KeychainError::NotFound),
            Ok(output) => Err(KeychainError::StoreFailed(output.reason())),
            Err(e) => Err(e),
        };

        self.trace("retrieve", service, account, result.as_ref().map(|_| ())).await;
        result
    }

    /// Remove the entry. Deleting an absent entry succeeds.
    pub async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        let validation = Self::validate_identifier("service", service)
            .and_then(|_| Self::validate_identifier("account", account));
        self.checked("delete", service, account, validation).await?;

        let result = self.remove(service, account).await;
        self.trace("delete", service, account, result.as_ref().copied()).await;
        result
    }

    /// True when `retrieve` would succeed. Never errors.
    pub async fn exists(&self, service: &str, account: &str) -> bool {
        self.retrieve(service, account).await.is_ok()
    }

    /// Delete then store. A failed delete skips the store and is returned.
    pub async fn update(&self, service: &str, account: &str, new_secret: &str) -> Result<(), KeychainError> {
        let validation = Self::validate_identifier("service", service)
            .and_then(|_| Self::validate_identifier("account", account))
            .and_then(|_| Self::validate_secret(new_secret));
        self.checked("update", service, account, validation).await?;

        let result = match self.remove(service, account).await {
            Ok(()) => self.add(service, account, new_secret).await,
            Err(e) => Err(e),
        };
        self.trace("update", service, account, result.as_ref().copied()).await;
        result
    }

    /// Entries whose service is under `<namespace>.`. Returns an empty list
    /// if the dump cannot be produced.
    pub async fn list_credentials(&self) -> Vec<KeychainEntry> {
        match self.runner.run(&["dump-keychain"]).await {
            Ok(output) if output.success() => parse_dump(&output.stdout)
                .into_iter()
                .filter(|e| self.in_namespace(&e.service))
                .collect(),
            Ok(output) => {
                tracing::debug!(reason = %output.reason(), "Keychain dump failed");
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Keychain dump could not run");
                Vec::new()
            }
        }
    }

    /// Delete every listed entry except protected ones. Returns the number
    /// removed, or `ClearIncomplete` naming each entry that could not be
    /// deleted.
    pub async fn clear_all_credentials(&self) -> Result<usize, KeychainError> {
        let entries: Vec<KeychainEntry> = self
            .list_credentials()
            .await
            .into_iter()
            .filter(|e| {
                let keep = self.protected.contains(e);
                if keep {
                    tracing::debug!(service = %e.service, account = %e.account, "Skipping protected keychain entry");
                }
                !keep
            })
            .collect();
        let total = entries.len();
        let mut failures = Vec::new();

        for entry in &entries {
            if let Err(e) = self.delete(&entry.service, &entry.account).await {
                failures.push(format!("{}/{}: {}", entry.service, entry.account, e));
            }
        }

        let removed = total - failures.len();
        if failures.is_empty() {
            tracing::info!(removed, "Cleared keychain entries");
            Ok(removed)
        } else {
            tracing::warn!(removed, failed = failures.len(), "Keychain clear incomplete");
            Err(KeychainError::ClearIncomplete {
                removed,
                total,
                failures,
            })
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn strip_quotes(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '"' | '\'' | '`')).collect()
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*"(svce|acct)"<blob>=(?:"(.*)"|<NULL>)\s*$"#)
            .expect("keychain attribute pattern is a valid regex")
    })
}

/// Parse `security dump-keychain` output into (service, account) pairs.
/// Records are separated by their `keychain:` header line.
fn parse_dump(dump: &str) -> Vec<KeychainEntry> {
    let pattern = attribute_pattern();
    let mut entries = Vec::new();
    let mut service: Option<String> = None;
    let mut account: Option<String> = None;

    let mut flush = |service: &mut Option<String>, account: &mut Option<String>| {
        if let (Some(s), Some(a)) = (service.take(), account.take()) {
            entries.push(KeychainEntry { service: s, account: a });
        }
    };

    for line in dump.lines() {
        if line.starts_with("keychain:") {
            flush(&mut service, &mut account);
            continue;
        }
        if let Some(caps) = pattern.captures(line) {
            let value = caps.get(2).map(|m| m.as_str().to_string());
            match &caps[1] {
                "svce" => service = value,
                _ => account = value,
            }
        }
    }
    flush(&mut service, &mut account);

    entries
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditPolicy, AuditQuery};
    use crate::keychain::MockRunner;
    use crate::kv::MemoryStore;

    fn adapter() -> KeychainAdapter<MockRunner> {
        KeychainAdapter::with_runner(MockRunner::new(), "warden")
    }

    #[tokio::test]
    async fn test_store_then_retrieve() {
        let kc = adapter();
        kc.store("warden.notion", "workspace", "secret_abc123").await.unwrap();
        let secret = kc.retrieve("warden.notion", "workspace").await.unwrap();
        assert_eq!(secret.as_str(), "secret_abc123");
    }

    #[tokio::test]
    async fn test_store_overwrites_existing_entry() {
        let kc = adapter();
        kc.store("warden.notion", "workspace", "first-value").await.unwrap();
        kc.store("warden.notion", "workspace", "second-value").await.unwrap();
        assert_eq!(kc.retrieve("warden.notion", "workspace").await.unwrap().as_str(), "second-value");
        assert_eq!(kc.runner().len(), 1);
    }

    #[tokio::test]
    async fn test_store_passes_arguments_as_argv() {
        let kc = adapter();
        kc.store("warden.svc", "acct", "p@ss w0rd $(rm -rf)").await.unwrap();
        let calls = kc.runner().calls();
        let add = calls
            .iter()
            .find(|c| c[0] == "add-generic-password")
            .expect("add must be invoked");
        assert_eq!(add[6], "p@ss w0rd $(rm -rf)", "secret is one argv element, never shell-parsed");
    }

    #[tokio::test]
    async fn test_store_validates_inputs() {
        let kc = adapter();
        assert!(matches!(kc.store("", "acct", "x").await, Err(KeychainError::InvalidInput(_))));
        assert!(matches!(kc.store("svc", "", "x").await, Err(KeychainError::InvalidInput(_))));
        assert!(matches!(kc.store("svc", "acct", "").await, Err(KeychainError::InvalidInput(_))));
        assert!(matches!(
            kc.store("svc\"; rm", "acct", "x").await,
            Err(KeychainError::InvalidInput(_))
        ));
        assert!(matches!(
            kc.store("-svc", "acct", "x").await,
            Err(KeychainError::InvalidInput(_))
        ));
        assert!(matches!(
            kc.store("svc", "acct", "line\nbreak").await,
            Err(KeychainError::InvalidInput(_))
        ));
        assert!(kc.runner().calls().is_empty(), "invalid input must never reach the subprocess");
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_reason() {
        let kc = adapter();
        kc.runner().fail_on("add-generic-password");
        let err = kc.store("warden.svc", "acct", "value").await.unwrap_err();
        match err {
            KeychainError::StoreFailed(reason) => assert!(reason.contains("not allowed")),
            other => panic!("expected StoreFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retrieve_missing_is_not_found() {
        let kc = adapter();
        let err = kc.retrieve("warden.none", "acct").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_retrieve_other_failure_is_distinct() {
        let kc = adapter();
        kc.runner().fail_on("find-generic-password");
        let err = kc.retrieve("warden.svc", "acct").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, KeychainError::StoreFailed(_)));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_success() {
        let kc = adapter();
        assert!(kc.delete("nonexistent-service", "acct").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let kc = adapter();
        kc.store("warden.svc", "acct", "value").await.unwrap();
        kc.delete("warden.svc", "acct").await.unwrap();
        assert!(!kc.exists("warden.svc", "acct").await);
    }

    #[tokio::test]
    async fn test_exists_never_errors() {
        let kc = adapter();
        assert!(!kc.exists("warden.svc", "acct").await);
        assert!(!kc.exists("", "").await);
        kc.store("warden.svc", "acct", "value").await.unwrap();
        assert!(kc.exists("warden.svc", "acct").await);
    }

    #[tokio::test]
    async fn test_update_replaces_value() {
        let kc = adapter();
        kc.store("warden.svc", "acct", "old").await.unwrap();
        kc.update("warden.svc", "acct", "new").await.unwrap();
        assert_eq!(kc.retrieve("warden.svc", "acct").await.unwrap().as_str(), "new");
    }

    #[tokio::test]
    async fn test_update_skips_store_when_delete_fails() {
        let kc = adapter();
        kc.runner().insert("warden.svc", "acct", "old");
        kc.runner().fail_on("delete-generic-password");

        assert!(kc.update("warden.svc", "acct", "new").await.is_err());
        let adds = kc
            .runner()
            .calls()
            .iter()
            .filter(|c| c[0] == "add-generic-password")
            .count();
        assert_eq!(adds, 0, "store step must be skipped after a failed delete");
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace() {
        let kc = adapter();
        kc.runner().insert("warden.notion", "workspace", "a");
        kc.runner().insert("warden.bank", "main", "b");
        kc.runner().insert("com.apple.safari", "me", "c");
        kc.runner().insert("wardenfoo", "other", "d");
        kc.runner().insert("warden", "bare", "e");

        let mut listed = kc.list_credentials().await;
        listed.sort_by(|a, b| a.service.cmp(&b.service));
        assert_eq!(
            listed,
            vec![
                KeychainEntry { service: "warden.bank".to_string(), account: "main".to_string() },
                KeychainEntry { service: "warden.notion".to_string(), account: "workspace".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_is_empty_on_failure() {
        let kc = adapter();
        kc.runner().insert("warden.notion", "workspace", "a");
        kc.runner().fail_on("dump-keychain");
        assert!(kc.list_credentials().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_removes_namespace_entries_only() {
        let kc = adapter();
        kc.runner().insert("warden.notion", "workspace", "a");
        kc.runner().insert("warden.bank", "main", "b");
        kc.runner().insert("com.apple.safari", "me", "c");

        assert_eq!(kc.clear_all_credentials().await.unwrap(), 2);
        assert_eq!(kc.runner().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_skips_protected_entries() {
        let kc = adapter().protect("warden.master", "passphrase");
        kc.runner().insert("warden.master", "passphrase", "keep-me");
        kc.runner().insert("warden.bank", "main", "b");

        assert_eq!(kc.list_credentials().await.len(), 2);
        assert_eq!(kc.clear_all_credentials().await.unwrap(), 1);
        assert_eq!(kc.retrieve("warden.master", "passphrase").await.unwrap().as_str(), "keep-me");
    }

    #[tokio::test]
    async fn test_clear_all_reports_failures() {
        let kc = adapter();
        kc.runner().insert("warden.notion", "workspace", "a");
        kc.runner().fail_on("delete-generic-password");

        match kc.clear_all_credentials().await {
            Err(KeychainError::ClearIncomplete { removed, total, failures }) => {
                assert_eq!((removed, total), (0, 1));
                assert_eq!(failures.len(), 1);
            }
            other => panic!("expected ClearIncomplete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_operations_are_audited_without_secret() {
        let audit = Arc::new(AuditLog::new(Arc::new(MemoryStore::new()), AuditPolicy::default()));
        let kc = adapter().with_audit(audit.clone());

        kc.store("warden.svc", "acct", "hunter2-secret").await.unwrap();
        let _ = kc.retrieve("warden.missing", "acct").await;

        let entries = audit.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.event_type == AuditEventType::KeychainAccess));
        assert!(entries.iter().any(|e| e.result == AuditResult::Failed));
        assert!(!audit.export_log().await.unwrap().contains("hunter2-secret"));
    }

    #[tokio::test]
    async fn test_rejected_operations_are_audited() {
        let audit = Arc::new(AuditLog::new(Arc::new(MemoryStore::new()), AuditPolicy::default()));
        let kc = adapter().with_audit(audit.clone());

        assert!(kc.store("-svc", "acct", "hunter2-secret").await.is_err());
        assert!(kc.retrieve("", "acct").await.is_err());
        assert!(kc.delete("svc", "bad acct").await.is_err());
        assert!(kc.update("warden.svc", "acct", "line\nbreak").await.is_err());
        assert!(kc.runner().calls().is_empty());

        let entries = audit.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries
            .iter()
            .all(|e| e.event_type == AuditEventType::KeychainAccess && e.result == AuditResult::Failed));
        let mut operations: Vec<_> =
            entries.iter().map(|e| e.data["operation"].as_str().unwrap_or_default()).collect();
        operations.sort_unstable();
        assert_eq!(operations, vec!["delete", "retrieve", "store", "update"]);
        assert!(!audit.export_log().await.unwrap().contains("hunter2-secret"));
    }

    #[test]
    fn test_parse_dump_handles_null_and_missing_fields() {
        let dump = "\
keychain: \"/k\"
class: \"genp\"
attributes:
    \"acct\"<blob>=\"alice\"
    \"svce\"<blob>=\"warden.one\"
keychain: \"/k\"
class: \"genp\"
attributes:
    \"acct\"<blob>=<NULL>
    \"svce\"<blob>=\"warden.two\"
keychain: \"/k\"
class: \"inet\"
attributes:
    \"srvr\"<blob>=\"example.com\"
";
        let entries = parse_dump(dump);
        assert_eq!(
            entries,
            vec![KeychainEntry { service: "warden.one".to_string(), account: "alice".to_string() }]
        );
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("we\"ird'`svc"), "weirdsvc");
    }
}
