// Warden — Audit Module
//
// Append-only, retention-bounded trail of credential operations. Sensitive
// fields are masked before an entry is ever persisted; the whole log lives
// under one key of the key-value store and is rewritten on every append.

mod clock;
mod error;
mod trail;
mod models;
mod policy;
mod redact;

pub use clock::{Clock, SystemClock};
pub use error::AuditError;
pub use trail::AuditLog;
pub use models::{
    AuditEntry, AuditEventType, AuditQuery, AuditResult, AuditStats, SuspiciousActivityReport,
    AUDIT_SCHEMA_VERSION,
};
pub use policy::AuditPolicy;
pub use redact::{is_sensitive_key, mask_value, redact};

#[cfg(test)]
pub(crate) use clock::ManualClock;
