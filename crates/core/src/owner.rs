//! Strategies for deciding which account owns an imported file.

use std::path::Path;

use tracing::debug;

use crate::acl::accounts;

/// Where the owner name of an imported object comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OwnerSource {
    /// The account running the import.
    #[default]
    Process,
    /// The object's owner on the local filesystem, falling back to the
    /// process account when ownership cannot be read.
    Filesystem,
    /// A fixed account name.
    Static(String),
}

impl OwnerSource {
    /// Resolve the owner name for `path`.
    pub fn owner_for(&self, path: &Path) -> String {
        match self {
            Self::Process => accounts::current_user_name(),
            Self::Filesystem => match accounts::file_owner_name(path) {
                Ok(name) => name,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "owner unreadable, using process account");
                    accounts::current_user_name()
                }
            },
            Self::Static(name) => name.clone(),
        }
    }
}
