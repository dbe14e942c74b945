// Warden — Platform Keychain Module
//
// Stores one secret per (service, account) pair in the operating system's
// credential manager by invoking its command-line tool. The OS store
// encrypts at rest, so values are handed over without going through the
// cipher engine.

mod adapter;
mod error;
mod runner;

pub use adapter::{KeychainAdapter, KeychainEntry};
pub use error::KeychainError;
pub use runner::{CommandOutput, CommandRunner, SecurityCli, DEFAULT_SECURITY_COMMAND};

#[cfg(test)]
pub(crate) use runner::mock::MockRunner;
