// Warden — Security requirements checklist and report
//
// Presentation over `validate`. The checklist re-derives each check as a
// pass/fail line; the report renders the checklist plus the validation
// result as plain text.

use std::fmt::Write as _;

use serde::Serialize;

use super::validator::{is_secret_like_name, is_suspicious_dir, is_token_shaped};
use super::{validate, EnvSnapshot, EnvironmentKind, Severity, ValidatorPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityRequirement {
    pub name: String,
    pub description: String,
    pub satisfied: bool,
    pub severity: Severity,
}

fn requirement(name: &str, description: String, satisfied: bool, severity: Severity) -> SecurityRequirement {
    SecurityRequirement {
        name: name.to_string(),
        description,
        satisfied,
        severity,
    }
}

pub fn get_security_requirements(snapshot: &EnvSnapshot, policy: &ValidatorPolicy) -> Vec<SecurityRequirement> {
    let environment = EnvironmentKind::from_selector(snapshot.var(&policy.environment_var));
    let missing: Vec<&str> = policy
        .required_vars
        .iter()
        .filter(|n| !snapshot.has_var(n))
        .map(String::as_str)
        .collect();
    let forbidden: Vec<&str> = policy
        .forbidden_vars
        .iter()
        .filter(|n| snapshot.has_var(n))
        .map(String::as_str)
        .collect();
    let secret_like = snapshot
        .vars
        .iter()
        .filter(|(k, v)| is_secret_like_name(k, policy) && is_token_shaped(v, policy.secret_min_len))
        .count();
    let tls_disabled = policy
        .tls_disable_indicators
        .iter()
        .any(|i| snapshot.var(&i.name).map(str::trim) == Some(i.value.as_str()));
    let https_ok = environment != EnvironmentKind::Production
        || snapshot
            .var(&policy.https_indicator_var)
            .is_some_and(|v| !v.trim().is_empty());
    let runtime_ok = snapshot.runtime.as_ref().map_or(true, |r| {
        r.major >= policy.min_runtime_major
            && !r.flags.iter().any(|f| policy.insecure_runtime_flags.contains(f))
    });
    let cwd_ok = snapshot
        .cwd
        .as_deref()
        .is_some_and(|cwd| !is_suspicious_dir(cwd, policy));

    vec![
        requirement(
            "Required variables",
            if missing.is_empty() {
                "All required environment variables are set".to_string()
            } else {
                format!("Missing: {}", missing.join(", "))
            },
            missing.is_empty(),
            Severity::High,
        ),
        requirement(
            "No plaintext secrets",
            if forbidden.is_empty() {
                "No forbidden secret variables are present".to_string()
            } else {
                format!("Present: {}", forbidden.join(", "))
            },
            forbidden.is_empty(),
            Severity::Critical,
        ),
        requirement(
            "Secret-like variables",
            format!("{} variable(s) look like they hold secrets", secret_like),
            secret_like == 0,
            Severity::Medium,
        ),
        requirement(
            "HTTPS in production",
            format!("Environment is {}", environment),
            https_ok,
            Severity::High,
        ),
        requirement(
            "Supported platform",
            format!("Running on {}, requires {}", snapshot.platform, policy.supported_platform),
            snapshot.platform.eq_ignore_ascii_case(&policy.supported_platform),
            Severity::Critical,
        ),
        requirement(
            "Credential manager",
            policy.security_command.clone(),
            snapshot.credential_manager_available,
            Severity::Critical,
        ),
        requirement(
            "TLS certificate validation",
            "Certificate validation must not be disabled".to_string(),
            !tls_disabled,
            Severity::Critical,
        ),
        requirement(
            "Runtime",
            match &snapshot.runtime {
                Some(r) => format!("{} {}", r.name, r.major),
                None => "No runtime information supplied".to_string(),
            },
            runtime_ok,
            Severity::Low,
        ),
        requirement(
            "Working directory",
            snapshot
                .cwd
                .as_deref()
                .map_or_else(|| "unknown".to_string(), |p| p.display().to_string()),
            cwd_ok,
            Severity::Low,
        ),
    ]
}

pub fn generate_security_report(snapshot: &EnvSnapshot, policy: &ValidatorPolicy) -> String {
    let result = validate(snapshot, policy);
    let requirements = get_security_requirements(snapshot, policy);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Warden security report");
    let _ = writeln!(out, "======================");
    let _ = writeln!(out, "Environment: {}", result.environment);
    let _ = writeln!(out, "Status:      {}", if result.is_valid { "PASS" } else { "FAIL" });
    let _ = writeln!(out);
    let _ = writeln!(out, "Requirements:");
    for r in &requirements {
        let mark = if r.satisfied { "✓" } else { "✗" };
        let _ = writeln!(out, "  {} {:<28} {}", mark, r.name, r.description);
    }

    if !result.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Errors:");
        for e in &result.errors {
            let _ = writeln!(out, "  - {}", e);
        }
    }
    if !result.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Warnings:");
        for w in &result.warnings {
            let _ = writeln!(out, "  - {}", w);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn snapshot() -> EnvSnapshot {
        EnvSnapshot {
            vars: [("HOME", "/Users/dev"), ("USER", "dev")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            platform: "macos".to_string(),
            cwd: Some(PathBuf::from("/Users/dev/app")),
            credential_manager_available: true,
            runtime: None,
        }
    }

    #[test]
    fn test_requirements_all_satisfied_on_clean_snapshot() {
        let reqs = get_security_requirements(&snapshot(), &ValidatorPolicy::default());
        assert_eq!(reqs.len(), 9);
        assert!(reqs.iter().all(|r| r.satisfied), "{:?}", reqs.iter().find(|r| !r.satisfied));
    }

    #[test]
    fn test_requirements_track_validation_failures() {
        let mut snap = snapshot();
        snap.vars.insert("GITHUB_TOKEN".to_string(), "ghp_abc".to_string());
        snap.platform = "windows".to_string();

        let reqs = get_security_requirements(&snap, &ValidatorPolicy::default());
        let failed: Vec<&str> = reqs.iter().filter(|r| !r.satisfied).map(|r| r.name.as_str()).collect();
        assert_eq!(failed, vec!["No plaintext secrets", "Supported platform"]);
    }

    #[test]
    fn test_report_lists_errors_without_values() {
        let mut snap = snapshot();
        snap.vars.insert("OPENAI_API_KEY".to_string(), "sk-verysecretvalue123456".to_string());

        let report = generate_security_report(&snap, &ValidatorPolicy::default());
        assert!(report.contains("Status:      FAIL"));
        assert!(report.contains("[POLICY_VIOLATION]"));
        assert!(report.contains("OPENAI_API_KEY"));
        assert!(!report.contains("sk-verysecretvalue123456"), "report must never echo values");
    }

    #[test]
    fn test_report_passes_clean_snapshot() {
        let report = generate_security_report(&snapshot(), &ValidatorPolicy::default());
        assert!(report.contains("Status:      PASS"));
        assert!(!report.contains("Errors:"));
    }
}
