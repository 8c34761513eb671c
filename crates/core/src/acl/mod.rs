//! Access-control scanning.
//!
//! An [`AclScanner`] reports, for one path, which identities hold an access
//! rule on it and an opaque text form of the rights. Failures are per path:
//! callers skip the entry and keep traversing.

pub mod accounts;
pub mod posix;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::AclError;

pub use posix::PosixAclScanner;

/// One access rule on a filesystem object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRule {
    /// Identity as reported by the platform, possibly qualified
    /// (`DOMAIN\user`, `host/user`).
    pub identity: String,
    /// Opaque rights text, e.g. `rw-`.
    pub rights: String,
}

impl AclRule {
    pub fn new(identity: impl Into<String>, rights: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            rights: rights.into(),
        }
    }

    /// The identity with any domain or host qualifier removed.
    pub fn account_name(&self) -> &str {
        bare_account_name(&self.identity)
    }
}

/// Source of access rules for filesystem paths.
pub trait AclScanner {
    fn rules_for(&self, path: &Path) -> Result<Vec<AclRule>, AclError>;
}

/// Strip everything up to and including the last `\` or `/`.
pub fn bare_account_name(identity: &str) -> &str {
    identity
        .rsplit(|c| c == '\\' || c == '/')
        .next()
        .unwrap_or(identity)
}

/// Scanner answering from rules registered in memory. Paths without
/// registered rules report no rules; paths marked unreadable fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryAclScanner {
    rules: HashMap<PathBuf, Vec<AclRule>>,
    unreadable: HashMap<PathBuf, String>,
}

impl MemoryAclScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, path: impl Into<PathBuf>, rules: Vec<AclRule>) -> Self {
        self.rules.insert(path.into(), rules);
        self
    }

    pub fn with_unreadable(mut self, path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        self.unreadable.insert(path.into(), detail.into());
        self
    }
}

impl AclScanner for MemoryAclScanner {
    fn rules_for(&self, path: &Path) -> Result<Vec<AclRule>, AclError> {
        if let Some(detail) = self.unreadable.get(path) {
            return Err(AclError::Unreadable {
                path: path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, detail.clone()),
            });
        }
        Ok(self.rules.get(path).cloned().unwrap_or_default())
    }
}
