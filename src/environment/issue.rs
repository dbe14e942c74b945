// Warden — Environment validation issues

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable code carried by every validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Something the subsystem needs is absent.
    MissingRequirements,
    /// Something the policy forbids is present.
    PolicyViolation,
    /// The environment weakens transport or platform security.
    InsecureEnvironment,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRequirements => "MISSING_REQUIREMENTS",
            Self::PolicyViolation => "POLICY_VIOLATION",
            Self::InsecureEnvironment => "INSECURE_ENVIRONMENT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: ErrorCode,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn new(code: ErrorCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
