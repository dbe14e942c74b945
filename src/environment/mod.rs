// Warden — Environment Module
//
// Startup precondition check for the host environment. `validate` is a pure
// function over an `EnvSnapshot` captured once by the caller, so tests build
// snapshots directly instead of mutating the process environment.

mod issue;
mod policy;
mod report;
mod snapshot;
mod validator;

pub use issue::{ErrorCode, Severity, ValidationIssue};
pub use policy::{EnvIndicator, ValidatorPolicy};
pub use report::{generate_security_report, get_security_requirements, SecurityRequirement};
pub use snapshot::{EnvSnapshot, RuntimeInfo};
pub use validator::{validate, EnvironmentKind, EnvironmentValidationResult};
