//! Outcome reports for the batch operations.
//!
//! Best-effort sub-steps never abort a run. Instead of being discarded, each
//! skipped entry is recorded with its reason so the operator can review it.

use std::fmt;

/// Why an entry was left out of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// An input path is neither a file nor a directory.
    PathNotFound,
    /// The account is on the blacklist.
    Blacklisted,
    /// The identity map has no (or an empty) target for the account.
    Unmapped,
    /// The mapped target identity does not exist and creation is disabled.
    MissingTargetIdentity(String),
    /// Access rules could not be read.
    AclUnreadable(String),
    /// A best-effort store or filesystem write failed.
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathNotFound => write!(f, "path not found"),
            Self::Blacklisted => write!(f, "blacklisted"),
            Self::Unmapped => write!(f, "no identity mapping"),
            Self::MissingTargetIdentity(target) => {
                write!(f, "target identity '{target}' does not exist")
            }
            Self::AclUnreadable(detail) => write!(f, "access rules unreadable: {detail}"),
            Self::Failed(detail) => write!(f, "failed: {detail}"),
        }
    }
}

/// One skipped entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Local path or virtual path the entry belongs to.
    pub path: String,
    /// Account name, when the skip concerns a single access rule.
    pub subject: Option<String>,
    pub reason: SkipReason,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "{} [{}]: {}", self.path, subject, self.reason),
            None => write!(f, "{}: {}", self.path, self.reason),
        }
    }
}

/// Result of [`crate::import::ImportEngine::import_paths`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub files_imported: usize,
    pub folders_ensured: usize,
    pub permissions_created: usize,
    pub skipped: Vec<Skipped>,
}

/// Result of [`crate::export::ExportEngine::export_path`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub files_written: usize,
    pub owner_mappings_written: usize,
    pub skipped: Vec<Skipped>,
}

impl ExportReport {
    /// Fold the report of another exported path into this one.
    pub fn merge(&mut self, other: ExportReport) {
        self.files_written += other.files_written;
        self.owner_mappings_written += other.owner_mappings_written;
        self.skipped.extend(other.skipped);
    }
}
