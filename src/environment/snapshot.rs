// Warden — Environment snapshot
//
// The only place the validator's inputs are read from the process. Runtime
// version and flags are not discoverable generically; embedders that host
// another runtime attach them with `with_runtime`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::ValidatorPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub name: String,
    pub major: u32,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvSnapshot {
    pub vars: BTreeMap<String, String>,
    /// Lowercase OS name as in `std::env::consts::OS`.
    pub platform: String,
    pub cwd: Option<PathBuf>,
    pub credential_manager_available: bool,
    pub runtime: Option<RuntimeInfo>,
}

impl EnvSnapshot {
    /// Read the current process environment once. Variables that are not
    /// valid UTF-8 are skipped.
    pub fn capture(policy: &ValidatorPolicy) -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            platform: std::env::consts::OS.to_string(),
            cwd: std::env::current_dir().ok(),
            credential_manager_available: Path::new(&policy.security_command).exists(),
            runtime: None,
        }
    }

    pub fn with_runtime(mut self, runtime: RuntimeInfo) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.var(name).is_some()
    }
}
