// Warden — Environment validator policy

use serde::{Deserialize, Serialize};

use crate::keychain::DEFAULT_SECURITY_COMMAND;

/// A variable whose presence with a given value signals a weakened setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvIndicator {
    pub name: String,
    pub value: String,
}

impl EnvIndicator {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Everything `validate` checks against. Loaded from the `[validator]`
/// section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorPolicy {
    pub required_vars: Vec<String>,
    /// Secrets that must go through the credential stores instead.
    pub forbidden_vars: Vec<String>,
    /// Case-insensitive substrings marking a variable name as secret-like.
    pub secret_keywords: Vec<String>,
    /// Values longer than this are candidates for the secret heuristic.
    pub secret_min_len: usize,
    pub tls_disable_indicators: Vec<EnvIndicator>,
    pub insecure_runtime_flags: Vec<String>,
    pub min_runtime_major: u32,
    pub supported_platform: String,
    pub security_command: String,
    /// Variable selecting production, development or test.
    pub environment_var: String,
    /// Must be set and non-empty in production.
    pub https_indicator_var: String,
    /// Working directories that earn a warning. `/` matches only itself,
    /// other entries also match their descendants.
    pub suspicious_working_dirs: Vec<String>,
}

impl Default for ValidatorPolicy {
    fn default() -> Self {
        Self {
            required_vars: vec!["HOME".to_string(), "USER".to_string()],
            forbidden_vars: vec![
                "NOTION_API_KEY".to_string(),
                "NOTION_TOKEN".to_string(),
                "BANKING_API_KEY".to_string(),
                "HEALTH_ACCESS_TOKEN".to_string(),
                "GITHUB_TOKEN".to_string(),
                "OPENAI_API_KEY".to_string(),
                "WARDEN_MASTER_PASSPHRASE".to_string(),
            ],
            secret_keywords: ["key", "token", "secret", "password", "credential", "auth"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            secret_min_len: 20,
            tls_disable_indicators: vec![
                EnvIndicator::new("NODE_TLS_REJECT_UNAUTHORIZED", "0"),
                EnvIndicator::new("GIT_SSL_NO_VERIFY", "1"),
                EnvIndicator::new("PYTHONHTTPSVERIFY", "0"),
            ],
            insecure_runtime_flags: vec![
                "--inspect".to_string(),
                "--inspect-brk".to_string(),
                "--allow-insecure-http".to_string(),
                "--disable-tls-verification".to_string(),
            ],
            min_runtime_major: 18,
            supported_platform: "macos".to_string(),
            security_command: DEFAULT_SECURITY_COMMAND.to_string(),
            environment_var: "WARDEN_ENV".to_string(),
            https_indicator_var: "WARDEN_HTTPS".to_string(),
            suspicious_working_dirs: vec![
                "/".to_string(),
                "/tmp".to_string(),
                "/var/tmp".to_string(),
                "/private/tmp".to_string(),
            ],
        }
    }
}
