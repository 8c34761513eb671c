//! r3sync core library.
//!
//! This crate moves file trees between a local filesystem and the R3
//! virtual filesystem stored in SQLite: configuration, persistence, path
//! translation, identity mapping, access-rule scanning, and the import and
//! export engines.

pub mod acl;
pub mod config;
pub mod db;
pub mod errors;
pub mod export;
pub mod identity;
pub mod import;
pub mod models;
pub mod owner;
pub mod report;
pub mod store;
pub mod vpath;

// Re-exports for convenience.
pub use acl::{AclRule, AclScanner, PosixAclScanner};
pub use config::R3SyncConfig;
pub use db::Database;
pub use errors::CoreError;
pub use export::{ExportEngine, ExportOptions};
pub use identity::{Blacklist, IdentityMap};
pub use import::{ImportEngine, ImportOptions};
pub use owner::OwnerSource;
pub use store::VfsStore;
