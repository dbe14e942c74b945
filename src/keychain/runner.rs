// Warden — Credential manager subprocess boundary
//
// Arguments are always passed as an argv array. No shell is involved, so
// service, account and secret values are never re-parsed or interpolated.
// No timeout is applied; the subprocess runs to completion.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use super::KeychainError;

/// macOS `security` tool.
pub const DEFAULT_SECURITY_COMMAND: &str = "/usr/bin/security";

/// Exit code `security` uses for "item could not be found".
pub(crate) const EXIT_ITEM_NOT_FOUND: i32 = 44;

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// True when the credential manager reports a missing item.
    pub fn is_not_found(&self) -> bool {
        self.code == Some(EXIT_ITEM_NOT_FOUND) || self.stderr.contains("could not be found")
    }

    /// First non-empty stderr line, for error messages.
    pub fn reason(&self) -> String {
        self.stderr
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("exit status {:?}", self.code))
    }
}

/// Runs one credential-manager invocation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, KeychainError>;
}

/// Production runner that spawns the platform `security` binary.
#[derive(Debug, Clone)]
pub struct SecurityCli {
    program: PathBuf,
}

impl SecurityCli {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_SECURITY_COMMAND)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SecurityCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for SecurityCli {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, KeychainError> {
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let by_code = CommandOutput {
            code: Some(EXIT_ITEM_NOT_FOUND),
            ..Default::default()
        };
        assert!(by_code.is_not_found());

        let by_message = CommandOutput {
            code: Some(1),
            stderr: "The specified item could not be found in the keychain.".to_string(),
            ..Default::default()
        };
        assert!(by_message.is_not_found());

        let other = CommandOutput {
            code: Some(1),
            stderr: "User interaction is not allowed.".to_string(),
            ..Default::default()
        };
        assert!(!other.is_not_found());
    }

    #[test]
    fn test_reason_uses_first_stderr_line() {
        let out = CommandOutput {
            code: Some(51),
            stderr: "\n  security: denied  \nmore\n".to_string(),
            ..Default::default()
        };
        assert_eq!(out.reason(), "security: denied");

        let silent = CommandOutput {
            code: Some(3),
            ..Default::default()
        };
        assert_eq!(silent.reason(), "exit status Some(3)");
    }

    #[tokio::test]
    async fn test_missing_binary_surfaces_io_error() {
        let cli = SecurityCli::with_program("/nonexistent/warden-security-binary");
        let err = cli.run(&["find-generic-password"]).await.unwrap_err();
        assert!(matches!(err, KeychainError::Io(_)));
    }
}
