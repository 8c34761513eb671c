//! The persistence capability consumed by the engines.
//!
//! [`VfsStore`] names exactly the operations the import, export, auto-map and
//! identity-management code needs. [`Database`] is the production
//! implementation; tests may wrap it to inject failures.

use crate::db::Database;
use crate::errors::DatabaseError;
use crate::models::{Identity, NewVirtualFile, Permission, VirtualFile};

/// Storage backend for the R3 virtual filesystem.
pub trait VfsStore {
    /// Idempotent get-or-create of a target identity.
    fn resolve_or_create_identity(&self, name: &str, display_name: &str)
        -> Result<i64, DatabaseError>;

    fn identity_by_name(&self, name: &str) -> Result<Option<Identity>, DatabaseError>;

    fn identity_by_id(&self, id: i64) -> Result<Option<Identity>, DatabaseError>;

    /// Every known identity, in a stable catalog order.
    fn all_identities(&self) -> Result<Vec<Identity>, DatabaseError>;

    fn delete_identity_by_name(&self, name: &str) -> Result<bool, DatabaseError>;

    /// Get-or-create of a folder row.
    fn ensure_folder(&self, path: &str, owner_id: i64) -> Result<i64, DatabaseError>;

    fn save_file(&self, file: &NewVirtualFile) -> Result<i64, DatabaseError>;

    fn files_under(&self, virtual_path: &str, recursive: bool)
        -> Result<Vec<VirtualFile>, DatabaseError>;

    fn add_permission(&self, permission: &Permission) -> Result<i64, DatabaseError>;
}

impl VfsStore for Database {
    fn resolve_or_create_identity(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<i64, DatabaseError> {
        self.get_or_create_user(name, display_name)
    }

    fn identity_by_name(&self, name: &str) -> Result<Option<Identity>, DatabaseError> {
        self.get_user_by_username(name)
    }

    fn identity_by_id(&self, id: i64) -> Result<Option<Identity>, DatabaseError> {
        self.get_user_by_id(id)
    }

    fn all_identities(&self) -> Result<Vec<Identity>, DatabaseError> {
        self.list_users()
    }

    fn delete_identity_by_name(&self, name: &str) -> Result<bool, DatabaseError> {
        self.delete_user_by_username(name)
    }

    fn ensure_folder(&self, path: &str, owner_id: i64) -> Result<i64, DatabaseError> {
        self.create_folder_if_not_exists(path, owner_id)
    }

    fn save_file(&self, file: &NewVirtualFile) -> Result<i64, DatabaseError> {
        Database::save_file(self, file)
    }

    fn files_under(
        &self,
        virtual_path: &str,
        recursive: bool,
    ) -> Result<Vec<VirtualFile>, DatabaseError> {
        self.get_files(virtual_path, recursive)
    }

    fn add_permission(&self, permission: &Permission) -> Result<i64, DatabaseError> {
        Database::add_permission(self, permission)
    }
}
