// Warden — Vault Module
//
// Application-level credential store. Each value is encrypted with the
// cipher engine under a master passphrase before it reaches the key-value
// store, and every operation is mirrored into the audit log.

mod error;
mod models;
mod registry;
mod store;

pub use error::VaultError;
pub use models::{CredentialSummary, StoredCredential, CREDENTIAL_SCHEMA_VERSION};
pub use registry::{
    AuditDetail, CredentialRegistry, CredentialTypeDescriptor, DataClassification,
    GENERIC_CREDENTIAL_LABEL,
};
pub use store::{PassphraseSource, SecureStore, MIN_CREDENTIAL_LEN};
