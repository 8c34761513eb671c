//! Error types for the r3sync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Acl(#[from] AclError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// A record (or the database file itself) was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Generic I/O error (e.g. creating the database directory).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

/// Errors from the identity mapping subsystem.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The mapping or blacklist file could not be loaded.
    #[error("identity file error at '{path}': {detail}")]
    MappingFileError { path: String, detail: String },

    /// Store failure while creating or deleting identities.
    #[error("identity store error: {0}")]
    Database(#[from] DatabaseError),

    /// Generic I/O error.
    #[error("identity I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ACL errors
// ---------------------------------------------------------------------------

/// Errors raised while reading the access-control data of a single path.
///
/// These never abort a traversal; callers record them as skipped entries.
#[derive(Debug, Error)]
pub enum AclError {
    /// The path's metadata or ACL could not be read.
    #[error("cannot read access rules of '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The extended ACL blob was present but malformed.
    #[error("malformed ACL on '{path}': {detail}")]
    Malformed { path: String, detail: String },

    /// The host platform exposes no ACL information.
    #[error("access rules are not supported on this platform")]
    Unsupported,
}

// ---------------------------------------------------------------------------
// Import errors
// ---------------------------------------------------------------------------

/// Fatal errors from the import engine.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The bytes of a local file could not be read.
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A local directory could not be listed.
    #[error("failed to list directory '{path}': {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Persisting an owner, folder or file failed.
    #[error("import database error: {0}")]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Fatal errors from the export engine.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A local directory or file could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the virtual subtree failed.
    #[error("export database error: {0}")]
    Database(#[from] DatabaseError),
}
