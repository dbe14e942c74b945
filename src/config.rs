// Warden — Configuration
//
// One TOML file, every section optional. Values are passed explicitly to the
// components at construction; nothing reads the configuration globally.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audit::AuditPolicy;
use crate::environment::ValidatorPolicy;
use crate::error::WardenError;
use crate::keychain::DEFAULT_SECURITY_COMMAND;

/// Upper bound on `audit.retention_days` (one hundred years).
const MAX_RETENTION_DAYS: i64 = 36_500;

/// Default directory for Warden data files.
pub fn default_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
}

/// Where the encrypted store's master passphrase comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassphraseMode {
    /// Random per process. Stored credentials are unreadable after restart.
    #[default]
    Ephemeral,
    /// Kept in the platform keychain, created on first use.
    Keychain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassphraseConfig {
    pub mode: PassphraseMode,
    /// Keychain service and account holding the passphrase in `keychain` mode.
    pub service: String,
    pub account: String,
}

impl Default for PassphraseConfig {
    fn default() -> Self {
        Self {
            mode: PassphraseMode::Ephemeral,
            service: "warden".to_string(),
            account: "master-passphrase".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeychainConfig {
    pub security_command: PathBuf,
    /// Service-name prefix identifying this application's keychain entries.
    pub namespace: String,
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            security_command: PathBuf::from(DEFAULT_SECURITY_COMMAND),
            namespace: "warden".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Prefix for every key the encrypted store writes.
    pub namespace: String,
    pub data_dir: PathBuf,
    pub passphrase: PassphraseConfig,
    pub keychain: KeychainConfig,
    pub audit: AuditPolicy,
    pub validator: ValidatorPolicy,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            namespace: "warden".to_string(),
            data_dir: default_data_dir(),
            passphrase: PassphraseConfig::default(),
            keychain: KeychainConfig::default(),
            audit: AuditPolicy::default(),
            validator: ValidatorPolicy::default(),
        }
    }
}

impl WardenConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, WardenError> {
        let config: Self = toml::from_str(content).map_err(|e| WardenError::Config {
            field: "toml".to_string(),
            reason: e.to_string(),
        })?;
        config.check()?;
        Ok(config)
    }

    /// Load from `path`.
    pub fn from_file(path: &Path) -> Result<Self, WardenError> {
        let content = std::fs::read_to_string(path).map_err(|e| WardenError::Config {
            field: "config_file".to_string(),
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` when given, else `<data_dir>/warden.toml` if it
    /// exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, WardenError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let default_path = default_data_dir().join("warden.toml");
        if default_path.exists() {
            tracing::debug!(path = %default_path.display(), "Loading configuration");
            Self::from_file(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("warden.db")
    }

    fn check(&self) -> Result<(), WardenError> {
        let invalid = |field: &str, reason: &str| {
            Err(WardenError::Config {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        };
        if self.namespace.is_empty() || self.namespace.contains(char::is_whitespace) {
            return invalid("namespace", "must be non-empty without whitespace");
        }
        if self.audit.storage_key.starts_with(&format!("{}.", self.namespace)) {
            return invalid("audit.storage_key", "must not live inside the credential namespace");
        }
        if self.audit.max_entries == 0 {
            return invalid("audit.max_entries", "must be at least 1");
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.audit.retention_days) {
            return invalid("audit.retention_days", "must be between 1 and 36500");
        }
        Ok(())
    }
}
