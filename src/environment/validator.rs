// Warden — Environment validator
//
// Seven independent checks over one snapshot. Errors decide validity;
// warnings are advisory and never flip `is_valid`.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use super::{EnvSnapshot, ErrorCode, Severity, ValidationIssue, ValidatorPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    Development,
    Production,
    Test,
}

impl EnvironmentKind {
    /// Unset or unrecognized selectors mean development.
    pub fn from_selector(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("production") | Some("prod") => Self::Production,
            Some("test") => Self::Test,
            _ => Self::Development,
        }
    }
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
    pub environment: EnvironmentKind,
}

#[derive(Default)]
struct Findings {
    errors: Vec<ValidationIssue>,
    warnings: Vec<String>,
}

impl Findings {
    fn error(&mut self, code: ErrorCode, severity: Severity, message: String) {
        self.errors.push(ValidationIssue::new(code, severity, message));
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Run every check against `snapshot`. Same inputs, same result.
pub fn validate(snapshot: &EnvSnapshot, policy: &ValidatorPolicy) -> EnvironmentValidationResult {
    let environment = EnvironmentKind::from_selector(snapshot.var(&policy.environment_var));
    let mut findings = Findings::default();

    check_required(snapshot, policy, &mut findings);
    check_forbidden(snapshot, policy, &mut findings);
    scan_for_secrets(snapshot, policy, &mut findings);
    check_environment_policy(snapshot, policy, environment, &mut findings);
    check_platform(snapshot, policy, &mut findings);
    check_runtime(snapshot, policy, &mut findings);
    check_working_dir(snapshot, policy, &mut findings);

    EnvironmentValidationResult {
        is_valid: findings.errors.is_empty(),
        errors: findings.errors,
        warnings: findings.warnings,
        environment,
    }
}

fn check_required(snapshot: &EnvSnapshot, policy: &ValidatorPolicy, findings: &mut Findings) {
    for name in &policy.required_vars {
        if !snapshot.has_var(name) {
            findings.error(
                ErrorCode::MissingRequirements,
                Severity::High,
                format!("Required environment variable {} is not set", name),
            );
        }
    }
}

fn check_forbidden(snapshot: &EnvSnapshot, policy: &ValidatorPolicy, findings: &mut Findings) {
    for name in &policy.forbidden_vars {
        if snapshot.has_var(name) {
            findings.error(
                ErrorCode::PolicyViolation,
                Severity::Critical,
                format!(
                    "Environment variable {} must not hold a secret; store it in the keychain instead",
                    name
                ),
            );
        }
    }
}

pub(super) fn is_secret_like_name(name: &str, policy: &ValidatorPolicy) -> bool {
    let lowered = name.to_ascii_lowercase();
    policy
        .secret_keywords
        .iter()
        .any(|k| lowered.contains(&k.to_ascii_lowercase()))
}

/// Long and drawn only from characters typical of keys and tokens.
pub(super) fn is_token_shaped(value: &str, min_len: usize) -> bool {
    value.len() > min_len
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '=' | '+' | '/'))
}

fn scan_for_secrets(snapshot: &EnvSnapshot, policy: &ValidatorPolicy, findings: &mut Findings) {
    for (name, value) in &snapshot.vars {
        if is_secret_like_name(name, policy) && is_token_shaped(value, policy.secret_min_len) {
            findings.warn(format!(
                "Environment variable {} looks like it contains a secret",
                name
            ));
        }
    }
}

fn check_environment_policy(
    snapshot: &EnvSnapshot,
    policy: &ValidatorPolicy,
    environment: EnvironmentKind,
    findings: &mut Findings,
) {
    if environment != EnvironmentKind::Production {
        return;
    }
    let https = snapshot
        .var(&policy.https_indicator_var)
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if https.is_none() {
        findings.error(
            ErrorCode::InsecureEnvironment,
            Severity::High,
            format!("Production requires HTTPS; {} is not set", policy.https_indicator_var),
        );
    }
}

fn check_platform(snapshot: &EnvSnapshot, policy: &ValidatorPolicy, findings: &mut Findings) {
    if !snapshot.platform.eq_ignore_ascii_case(&policy.supported_platform) {
        findings.error(
            ErrorCode::MissingRequirements,
            Severity::Critical,
            format!(
                "Platform {} is not supported; the keychain adapter requires {}",
                snapshot.platform, policy.supported_platform
            ),
        );
    }
    if !snapshot.credential_manager_available {
        findings.error(
            ErrorCode::MissingRequirements,
            Severity::Critical,
            format!("Credential manager {} is not available", policy.security_command),
        );
    }
}

fn check_runtime(snapshot: &EnvSnapshot, policy: &ValidatorPolicy, findings: &mut Findings) {
    if let Some(runtime) = &snapshot.runtime {
        if runtime.major < policy.min_runtime_major {
            findings.warn(format!(
                "{} {} is outdated; version {} or newer is recommended",
                runtime.name, runtime.major, policy.min_runtime_major
            ));
        }
        for flag in &runtime.flags {
            if policy.insecure_runtime_flags.iter().any(|f| f == flag) {
                findings.warn(format!("Insecure runtime flag {} is set", flag));
            }
        }
    }

    for indicator in &policy.tls_disable_indicators {
        if snapshot.var(&indicator.name).map(str::trim) == Some(indicator.value.as_str()) {
            findings.error(
                ErrorCode::InsecureEnvironment,
                Severity::Critical,
                format!(
                    "TLS certificate validation is disabled ({}={})",
                    indicator.name, indicator.value
                ),
            );
        }
    }
}

pub(super) fn is_suspicious_dir(cwd: &Path, policy: &ValidatorPolicy) -> bool {
    policy.suspicious_working_dirs.iter().any(|dir| {
        let dir = Path::new(dir);
        if dir == Path::new("/") {
            cwd == dir
        } else {
            cwd.starts_with(dir)
        }
    })
}

fn check_working_dir(snapshot: &EnvSnapshot, policy: &ValidatorPolicy, findings: &mut Findings) {
    match &snapshot.cwd {
        None => findings.warn("Working directory could not be determined".to_string()),
        Some(cwd) if is_suspicious_dir(cwd, policy) => findings.warn(format!(
            "Running from {}; a dedicated application directory is recommended",
            cwd.display()
        )),
        Some(_) => {}
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::RuntimeInfo;
    use std::path::PathBuf;

    fn clean_snapshot() -> EnvSnapshot {
        EnvSnapshot {
            vars: [("HOME", "/Users/dev"), ("USER", "dev"), ("PATH", "/usr/bin:/bin")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            platform: "macos".to_string(),
            cwd: Some(PathBuf::from("/Users/dev/projects/warden")),
            credential_manager_available: true,
            runtime: None,
        }
    }

    fn with_var(mut snapshot: EnvSnapshot, name: &str, value: &str) -> EnvSnapshot {
        snapshot.vars.insert(name.to_string(), value.to_string());
        snapshot
    }

    #[test]
    fn test_clean_environment_is_valid() {
        let result = validate(&clean_snapshot(), &ValidatorPolicy::default());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);
        assert_eq!(result.environment, EnvironmentKind::Development);
    }

    #[test]
    fn test_forbidden_variable_is_policy_violation() {
        let snapshot = with_var(clean_snapshot(), "OPENAI_API_KEY", "sk-test");
        let result = validate(&snapshot, &ValidatorPolicy::default());

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::PolicyViolation);
        assert!(result.errors[0].message.contains("OPENAI_API_KEY"), "error must name the variable");
    }

    #[test]
    fn test_missing_required_variable() {
        let mut snapshot = clean_snapshot();
        snapshot.vars.remove("USER");
        let result = validate(&snapshot, &ValidatorPolicy::default());

        assert!(!result.is_valid);
        assert_eq!(result.errors[0].code, ErrorCode::MissingRequirements);
        assert!(result.errors[0].message.contains("USER"));
    }

    #[test]
    fn test_secret_heuristic_only_warns() {
        let snapshot = with_var(clean_snapshot(), "MY_SERVICE_TOKEN", "abcdefghijklmnopqrstuvwxyz012345");
        let result = validate(&snapshot, &ValidatorPolicy::default());

        assert!(result.is_valid, "heuristic hits never fail validation");
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("MY_SERVICE_TOKEN"));
        assert!(!result.warnings[0].contains("abcdefghij"), "warning must not echo the value");
    }

    #[test]
    fn test_secret_heuristic_ignores_short_or_prose_values() {
        let snapshot = with_var(clean_snapshot(), "API_KEY_HINT", "short");
        let snapshot = with_var(snapshot, "AUTH_MODE", "use the browser flow for sign in");
        let result = validate(&snapshot, &ValidatorPolicy::default());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_production_requires_https_indicator() {
        let snapshot = with_var(clean_snapshot(), "WARDEN_ENV", "production");
        let result = validate(&snapshot, &ValidatorPolicy::default());
        assert_eq!(result.environment, EnvironmentKind::Production);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].code, ErrorCode::InsecureEnvironment);

        let fixed = with_var(snapshot, "WARDEN_HTTPS", "true");
        assert!(validate(&fixed, &ValidatorPolicy::default()).is_valid);
    }

    #[test]
    fn test_https_indicator_not_needed_outside_production() {
        let snapshot = with_var(clean_snapshot(), "WARDEN_ENV", "test");
        let result = validate(&snapshot, &ValidatorPolicy::default());
        assert_eq!(result.environment, EnvironmentKind::Test);
        assert!(result.is_valid);
    }

    #[test]
    fn test_unsupported_platform_and_missing_command() {
        let mut snapshot = clean_snapshot();
        snapshot.platform = "linux".to_string();
        snapshot.credential_manager_available = false;
        let result = validate(&snapshot, &ValidatorPolicy::default());

        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.code == ErrorCode::MissingRequirements));
        assert!(result.errors[0].message.contains("linux"));
    }

    #[test]
    fn test_tls_disabled_is_hard_error() {
        let snapshot = with_var(clean_snapshot(), "NODE_TLS_REJECT_UNAUTHORIZED", "0");
        let result = validate(&snapshot, &ValidatorPolicy::default());
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].code, ErrorCode::InsecureEnvironment);
        assert_eq!(result.errors[0].severity, Severity::Critical);

        let enabled = with_var(clean_snapshot(), "NODE_TLS_REJECT_UNAUTHORIZED", "1");
        assert!(validate(&enabled, &ValidatorPolicy::default()).is_valid);
    }

    #[test]
    fn test_runtime_checks_warn() {
        let snapshot = clean_snapshot().with_runtime(RuntimeInfo {
            name: "node".to_string(),
            major: 16,
            flags: vec!["--inspect".to_string(), "--max-old-space-size=4096".to_string()],
        });
        let result = validate(&snapshot, &ValidatorPolicy::default());

        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 2, "one outdated warning plus one per insecure flag");
        assert!(result.warnings.iter().any(|w| w.contains("--inspect")));
    }

    #[test]
    fn test_working_directory_heuristic() {
        let policy = ValidatorPolicy::default();
        assert!(is_suspicious_dir(Path::new("/"), &policy));
        assert!(is_suspicious_dir(Path::new("/tmp/build"), &policy));
        assert!(!is_suspicious_dir(Path::new("/Users/dev"), &policy));

        let mut snapshot = clean_snapshot();
        snapshot.cwd = None;
        let result = validate(&snapshot, &policy);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_validate_is_deterministic() {
        let snapshot = with_var(clean_snapshot(), "GITHUB_TOKEN", "ghp_x");
        let policy = ValidatorPolicy::default();
        assert_eq!(validate(&snapshot, &policy), validate(&snapshot, &policy));
    }

    #[test]
    fn test_environment_selector() {
        assert_eq!(EnvironmentKind::from_selector(None), EnvironmentKind::Development);
        assert_eq!(EnvironmentKind::from_selector(Some(" PROD ")), EnvironmentKind::Production);
        assert_eq!(EnvironmentKind::from_selector(Some("staging")), EnvironmentKind::Development);
    }
}
