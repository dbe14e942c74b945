// Warden — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommand groups: env, keychain, vault, audit.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// Warden — local credential and secrets management.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to <data dir>/warden/warden.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the host environment against the security policy.
    Env {
        #[command(subcommand)]
        action: EnvCommand,
    },

    /// Manage secrets in the platform keychain.
    Keychain {
        #[command(subcommand)]
        action: KeychainCommand,
    },

    /// Manage credentials in the encrypted local store.
    Vault {
        #[command(subcommand)]
        action: VaultCommand,
    },

    /// Inspect and maintain the audit log.
    Audit {
        #[command(subcommand)]
        action: AuditCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Validate the environment; exits non-zero when invalid.
    Check {
        /// Print the result as JSON.
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show the security requirements checklist.
    Requirements,

    /// Print the full security report.
    Report,
}

#[derive(Subcommand, Debug)]
pub enum KeychainCommand {
    /// Store a secret, replacing any existing entry.
    Set {
        service: String,
        account: String,

        /// The secret value.
        /// Prefer a shell that does not record history when passing real secrets.
        #[arg(long)]
        secret: String,
    },

    /// Retrieve a secret (masked unless --reveal is given).
    Get {
        service: String,
        account: String,

        #[arg(long, default_value = "false")]
        reveal: bool,
    },

    /// Delete a secret. Deleting a missing entry succeeds.
    Delete { service: String, account: String },

    /// List this application's keychain entries (no secrets).
    List,

    /// Delete every keychain entry in this application's namespace, except the master passphrase.
    Clear {
        /// Confirm the bulk delete.
        #[arg(long, default_value = "false")]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Encrypt and store a credential.
    Store {
        service: String,
        account: String,

        #[arg(long)]
        secret: String,
    },

    /// Decrypt a credential (masked unless --reveal is given).
    Get {
        service: String,
        account: String,

        #[arg(long, default_value = "false")]
        reveal: bool,
    },

    /// Delete a credential.
    Delete { service: String, account: String },

    /// List stored credentials (metadata only, no secrets).
    List,

    /// Delete every credential in the store's namespace.
    Clear {
        #[arg(long, default_value = "false")]
        yes: bool,
    },

    /// Store, read back and delete a throwaway credential.
    Demo,
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Counts by result and event type.
    Stats,

    /// Show recent entries, newest first.
    Show {
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Only failed operations.
        #[arg(long, default_value = "false")]
        failed: bool,
    },

    /// Failed entries from the last N hours.
    Alerts {
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// Run the suspicious-activity heuristics.
    Suspicious,

    /// Export the whole log as JSON.
    Export {
        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Remove entries older than N days.
    Prune {
        #[arg(long, default_value = "90")]
        days: i64,
    },
}
