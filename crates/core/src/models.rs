//! Domain model types shared by the engines and the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// A user account known to the R3 target system (a row of `users`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    /// Short account name, e.g. `jdoe`.
    pub username: String,
    /// Display or full name.
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Files and folders
// ---------------------------------------------------------------------------

/// A file stored in the R3 virtual filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    pub id: i64,
    /// File name including extension.
    pub name: String,
    /// Virtual directory holding the file, `/`-separated.
    pub virtual_path: String,
    pub content: Vec<u8>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A file about to be persisted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewVirtualFile {
    pub name: String,
    pub virtual_path: String,
    pub content: Vec<u8>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A folder row of the virtual filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFolder {
    pub id: i64,
    pub path: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Kind of object a permission row refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    File,
    Folder,
}

impl ObjectKind {
    /// Parse the stored `object_type` column.
    pub fn from_str_val(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "folder" => Some(Self::Folder),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

/// A right granted to a target identity on a file or folder.
///
/// `rights` is opaque: it carries the native rights value as text
/// (`rwx`-style on POSIX hosts) and is never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub identity_id: i64,
    pub object_kind: ObjectKind,
    pub object_id: i64,
    pub rights: String,
}
