//! Typed query helpers for every table in the R3 database.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::models::{Identity, NewVirtualFile, Permission, VirtualFile, VirtualFolder};

impl Database {
    // -- users --------------------------------------------------------------

    /// Return the id of `username`, inserting the identity if it is missing.
    pub fn get_or_create_user(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<i64, DatabaseError> {
        self.transaction(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }

            conn.execute(
                "INSERT INTO users (username, displayname) VALUES (?1, ?2)",
                params![username, display_name],
            )?;
            let id = conn.last_insert_rowid();
            debug!(id, username, "created user");
            Ok(id)
        })
    }

    /// Look up a user by exact username.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<Identity>, DatabaseError> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT id, username, displayname FROM users WHERE username = ?1",
                params![username],
                identity_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up a user by id.
    pub fn get_user_by_id(&self, id: i64) -> Result<Option<Identity>, DatabaseError> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT id, username, displayname FROM users WHERE id = ?1",
                params![id],
                identity_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// List every user in insertion order.
    pub fn list_users(&self) -> Result<Vec<Identity>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, username, displayname FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], identity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Delete a user by username. Returns `true` if a row was removed.
    pub fn delete_user_by_username(&self, username: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let changed = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        debug!(username, changed, "deleted user");
        Ok(changed > 0)
    }

    // -- folders ------------------------------------------------------------

    /// Return the id of the folder at `path`, inserting it if it is missing.
    pub fn create_folder_if_not_exists(
        &self,
        path: &str,
        owner_id: i64,
    ) -> Result<i64, DatabaseError> {
        self.transaction(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM folders WHERE path = ?1",
                    params![path],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }

            conn.execute(
                "INSERT INTO folders (path, owner_id, created_utc) VALUES (?1, ?2, ?3)",
                params![path, owner_id, Utc::now().to_rfc3339()],
            )?;
            let id = conn.last_insert_rowid();
            debug!(id, path, "created folder");
            Ok(id)
        })
    }

    /// Look up a folder by its virtual path.
    pub fn get_folder(&self, path: &str) -> Result<Option<VirtualFolder>, DatabaseError> {
        let conn = self.conn();
        let folder = conn
            .query_row(
                "SELECT id, path, owner_id, created_utc FROM folders WHERE path = ?1",
                params![path],
                |row| {
                    let created: Option<String> = row.get(3)?;
                    Ok(VirtualFolder {
                        id: row.get(0)?,
                        path: row.get(1)?,
                        owner_id: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                        created_at: parse_datetime(created.as_deref()),
                    })
                },
            )
            .optional()?;
        Ok(folder)
    }

    // -- files --------------------------------------------------------------

    /// Store a file. An existing row with the same `(path, name)` is
    /// overwritten in place and keeps its id.
    pub fn save_file(&self, file: &NewVirtualFile) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let id: i64 = conn.query_row(
            "INSERT INTO files (name, path, content, owner_id, created_utc)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (path, name) DO UPDATE SET
                 content = excluded.content,
                 owner_id = excluded.owner_id,
                 created_utc = excluded.created_utc
             RETURNING id",
            params![
                file.name,
                file.virtual_path,
                file.content,
                file.owner_id,
                file.created_at.to_rfc3339()
            ],
            |row| row.get(0),
        )?;
        debug!(id, name = %file.name, path = %file.virtual_path, "saved file");
        Ok(id)
    }

    /// Files stored at `folder_path`, or under it when `recursive` is set.
    ///
    /// The recursive form is a case-sensitive string prefix match on the
    /// stored path after trimming trailing `/` from `folder_path`, so `/`
    /// selects every file.
    pub fn get_files(
        &self,
        folder_path: &str,
        recursive: bool,
    ) -> Result<Vec<VirtualFile>, DatabaseError> {
        let conn = self.conn();
        let files = if recursive {
            let prefix = folder_path.trim_end_matches('/');
            let mut stmt = conn.prepare(
                "SELECT id, name, path, content, owner_id, created_utc FROM files
                 WHERE substr(path, 1, length(?1)) = ?1
                 ORDER BY path, name",
            )?;
            let rows = stmt
                .query_map(params![prefix], file_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, name, path, content, owner_id, created_utc FROM files
                 WHERE path = ?1
                 ORDER BY name",
            )?;
            let rows = stmt
                .query_map(params![folder_path], file_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        Ok(files)
    }

    // -- permissions --------------------------------------------------------

    /// Insert a permission row. Rows are never deduplicated.
    pub fn add_permission(&self, perm: &Permission) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO permissions (user_id, object_type, object_id, rights)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                perm.identity_id,
                perm.object_kind.to_string(),
                perm.object_id,
                perm.rights
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, identity_id = perm.identity_id, object = %perm.object_kind, "added permission");
        Ok(id)
    }

    /// All permission rows attached to one object, in insertion order.
    ///
    /// Read-back helper for tests and diagnostics; the engines only append.
    pub fn list_permissions(
        &self,
        object_kind: crate::models::ObjectKind,
        object_id: i64,
    ) -> Result<Vec<Permission>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, object_type, object_id, rights FROM permissions
             WHERE object_type = ?1 AND object_id = ?2 ORDER BY id",
        )?;
        let perms = stmt
            .query_map(params![object_kind.to_string(), object_id], |row| {
                let kind: String = row.get(1)?;
                Ok(Permission {
                    identity_id: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                    object_kind: crate::models::ObjectKind::from_str_val(&kind)
                        .unwrap_or(object_kind),
                    object_id: row.get(2)?,
                    rights: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(perms)
    }

    /// Total number of permission rows.
    pub fn count_permissions(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM permissions", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<VirtualFile> {
    let created: Option<String> = row.get(5)?;
    Ok(VirtualFile {
        id: row.get(0)?,
        name: row.get(1)?,
        virtual_path: row.get(2)?,
        content: row.get::<_, Option<Vec<u8>>>(3)?.unwrap_or_default(),
        owner_id: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        created_at: parse_datetime(created.as_deref()),
    })
}

/// Parse a stored timestamp, returning `Utc::now()` as a fallback if it is
/// missing or unparsable.
fn parse_datetime(s: Option<&str>) -> DateTime<Utc> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
