//! Bulk creation and deletion of store identities driven by a mapping file.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use super::{Blacklist, IdentityMap};
use crate::errors::DatabaseError;
use crate::store::VfsStore;

/// Which side of each `local=target` pair to act on, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserManageAction {
    AddFirst,
    AddSecond,
    AddBoth,
    DeleteFirst,
    DeleteSecond,
    DeleteBoth,
}

impl UserManageAction {
    pub const ALL: [UserManageAction; 6] = [
        Self::AddFirst,
        Self::AddSecond,
        Self::AddBoth,
        Self::DeleteFirst,
        Self::DeleteSecond,
        Self::DeleteBoth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddFirst => "add-first",
            Self::AddSecond => "add-second",
            Self::AddBoth => "add-both",
            Self::DeleteFirst => "delete-first",
            Self::DeleteSecond => "delete-second",
            Self::DeleteBoth => "delete-both",
        }
    }

    fn is_add(self) -> bool {
        matches!(self, Self::AddFirst | Self::AddSecond | Self::AddBoth)
    }

    fn first(self) -> bool {
        matches!(
            self,
            Self::AddFirst | Self::AddBoth | Self::DeleteFirst | Self::DeleteBoth
        )
    }

    fn second(self) -> bool {
        matches!(
            self,
            Self::AddSecond | Self::AddBoth | Self::DeleteSecond | Self::DeleteBoth
        )
    }
}

impl fmt::Display for UserManageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserManageAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown user-manage action '{s}'"))
    }
}

/// Counts of identities touched by [`manage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManageReport {
    pub created: usize,
    pub deleted: usize,
    /// Pairs left alone because one of their names is blacklisted.
    pub skipped: usize,
}

/// Apply `action` to every pair of `mapping`, in key order.
pub fn manage(
    store: &dyn VfsStore,
    mapping: &IdentityMap,
    action: UserManageAction,
    blacklist: &Blacklist,
) -> Result<ManageReport, DatabaseError> {
    info!(%action, pairs = mapping.len(), "managing identities");
    let mut report = ManageReport::default();

    for (local, target) in mapping.iter() {
        if blacklist.contains(local) || (!target.is_empty() && blacklist.contains(target)) {
            debug!(local, target, "pair is blacklisted");
            report.skipped += 1;
            continue;
        }

        let mut names = Vec::with_capacity(2);
        if action.first() {
            names.push(local);
        }
        if action.second() && !target.is_empty() {
            names.push(target);
        }

        for name in names {
            apply(store, name, action, &mut report)?;
        }
    }

    info!(
        created = report.created,
        deleted = report.deleted,
        skipped = report.skipped,
        "identity management complete"
    );
    Ok(report)
}

fn apply(
    store: &dyn VfsStore,
    name: &str,
    action: UserManageAction,
    report: &mut ManageReport,
) -> Result<(), DatabaseError> {
    if action.is_add() {
        if store.identity_by_name(name)?.is_none() {
            let id = store.resolve_or_create_identity(name, name)?;
            debug!(name, id, "created identity");
            report.created += 1;
        }
    } else if store.delete_identity_by_name(name)? {
        debug!(name, "deleted identity");
        report.deleted += 1;
    }
    Ok(())
}
