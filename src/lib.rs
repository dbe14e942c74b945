// Warden — Library root
//
// Credential and secrets management: a cipher engine, the platform keychain
// adapter, an encrypted local store, the audit log and the environment
// validator, plus the configuration and CLI around them.

pub mod audit;
pub mod cipher;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod keychain;
pub mod kv;
pub mod vault;

pub use error::{Result, WardenError};
